use crate::{ConfigError, EndpointStatistics, Statistics, DEFAULT_THRESHOLD_PCT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Percentage changes of one endpoint against its baseline. Positive values are regressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationReport {
    pub latency_increase: f64,
    /// Change in the number of failed requests.
    pub error_rate_increase: f64,
    pub throughput_decrease: f64,
    pub success_rate_decrease: f64,
}

impl DegradationReport {
    pub fn between(current: &EndpointStatistics, previous: &EndpointStatistics) -> Self {
        Self {
            latency_increase: percentage_increase(
                current.average_duration.as_secs_f64(),
                previous.average_duration.as_secs_f64(),
            ),
            error_rate_increase: percentage_increase(
                current.failed_requests as f64,
                previous.failed_requests as f64,
            ),
            throughput_decrease: percentage_decrease(
                current.requests_per_second,
                previous.requests_per_second,
            ),
            success_rate_decrease: percentage_decrease(
                current.success_rate(),
                previous.success_rate(),
            ),
        }
    }

    /// Any metric strictly above `threshold_pct`.
    pub fn exceeds(&self, threshold_pct: f64) -> bool {
        self.latency_increase > threshold_pct
            || self.error_rate_increase > threshold_pct
            || self.throughput_decrease > threshold_pct
            || self.success_rate_decrease > threshold_pct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub current: EndpointStatistics,
    pub previous: EndpointStatistics,
    pub degradation: bool,
    pub changes: DegradationReport,
}

/// Verdict of comparing a run against its baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradationOutcome {
    pub degradation: bool,
    /// Only endpoints present in both snapshots.
    pub endpoints: BTreeMap<String, Comparison>,
}

impl DegradationOutcome {
    pub fn degraded_endpoints(&self) -> impl Iterator<Item = (&String, &Comparison)> {
        self.endpoints.iter().filter(|(_, c)| c.degradation)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DegradationDetector {
    threshold_pct: f64,
}

impl Default for DegradationDetector {
    fn default() -> Self {
        Self {
            threshold_pct: DEFAULT_THRESHOLD_PCT,
        }
    }
}

impl DegradationDetector {
    pub fn new(threshold_pct: f64) -> Result<Self, ConfigError> {
        if !threshold_pct.is_finite() || threshold_pct < 0. {
            return Err(ConfigError::Threshold(threshold_pct));
        }
        Ok(Self { threshold_pct })
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    pub fn compare(&self, current: &Statistics, baseline: &Statistics) -> DegradationOutcome {
        let mut outcome = DegradationOutcome::default();

        for (key, current_stats) in &current.endpoint_stats {
            let Some(baseline_stats) = baseline.endpoint_stats.get(key) else {
                debug!("No baseline for {key}; skipping comparison.");
                continue;
            };

            let changes = DegradationReport::between(current_stats, baseline_stats);
            let degradation = changes.exceeds(self.threshold_pct);
            if degradation {
                warn!(
                    "Degradation on {key}: latency {:+.2}%, errors {:+.2}%, throughput drop {:.2}%, success rate drop {:.2}%",
                    changes.latency_increase,
                    changes.error_rate_increase,
                    changes.throughput_decrease,
                    changes.success_rate_decrease,
                );
                outcome.degradation = true;
            }

            outcome.endpoints.insert(
                key.clone(),
                Comparison {
                    current: current_stats.clone(),
                    previous: baseline_stats.clone(),
                    degradation,
                    changes,
                },
            );
        }

        outcome
    }
}

/// `((current - previous) / previous) × 100`, or zero when there is no previous value.
pub fn percentage_increase(current: f64, previous: f64) -> f64 {
    if previous == 0. {
        return 0.;
    }
    ((current - previous) / previous) * 100.
}

pub fn percentage_decrease(current: f64, previous: f64) -> f64 {
    -percentage_increase(current, previous)
}
