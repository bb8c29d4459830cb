use crate::stats::average;
use crate::{LoadTestResult, RequestResult, Statistics, StepLoad};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationNanoSeconds};
use std::collections::BTreeMap;
use std::time::Duration;

/// Rollup of one ramp step.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatistics {
    pub load: StepLoad,
    pub step_number: usize,
    /// Mean of the per-endpoint average latencies.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub average_latency: Duration,
    /// Sum of the per-endpoint requests per second.
    pub requests_per_second: f64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub total_requests: usize,
    pub dropped: u64,
}

/// Per-endpoint view across every step of a ramp.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub average_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p50_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p95_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p99_latency: Duration,
    pub requests_per_second: f64,
    pub success_rate: f64,
    /// Highest user count the endpoint was exercised at. Zero for data ramps.
    pub max_concurrent: usize,
    /// Highest data size the endpoint was exercised at. Zero for user ramps.
    pub max_data_size: usize,
}

/// Reduction of a whole ramp test.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestStats {
    pub steps: Vec<StepStatistics>,
    pub endpoint_stats: BTreeMap<String, LoadStats>,
    /// Two-term running average, `(previous + step) / 2`, seeded with the first step. Later
    /// steps weigh more than earlier ones.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub average_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub max_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub min_latency: Duration,
    pub total_requests: usize,
    /// Summed step run time, cool-downs excluded.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub test_duration: Duration,
}

impl LoadTestStats {
    pub fn calculate(steps: &[LoadTestResult]) -> Self {
        let mut stats = LoadTestStats::default();

        for step in steps {
            let step_stats = Statistics::calculate(&step.results);
            let average_latency = step_average_latency(&step_stats);

            stats.steps.push(StepStatistics {
                load: step.load,
                step_number: step.step_number,
                average_latency,
                requests_per_second: step_stats
                    .endpoint_stats
                    .values()
                    .map(|es| es.requests_per_second)
                    .sum(),
                success_rate: success_rate(&step_stats),
                error_rate: 100. - success_rate(&step_stats),
                total_requests: step_stats.total_requests,
                dropped: step.dropped,
            });

            stats.total_requests += step_stats.total_requests;
            stats.test_duration += step.elapsed;
            stats.update_latency(average_latency);
        }

        stats.endpoint_stats = endpoint_rollups(steps);
        stats
    }

    fn update_latency(&mut self, latency: Duration) {
        if self.min_latency.is_zero() || latency < self.min_latency {
            self.min_latency = latency;
        }
        if latency > self.max_latency {
            self.max_latency = latency;
        }
        if self.average_latency.is_zero() {
            self.average_latency = latency;
        } else {
            self.average_latency = (self.average_latency + latency) / 2;
        }
    }
}

fn step_average_latency(stats: &Statistics) -> Duration {
    let total: Duration = stats
        .endpoint_stats
        .values()
        .map(|es| es.average_duration)
        .sum();
    average(total, stats.endpoint_stats.len())
}

fn success_rate(stats: &Statistics) -> f64 {
    let (total, success) = stats
        .endpoint_stats
        .values()
        .fold((0, 0), |(total, success), es| {
            (total + es.total_requests, success + es.success_requests)
        });

    if total == 0 {
        0.
    } else {
        success as f64 / total as f64 * 100.
    }
}

fn endpoint_rollups(steps: &[LoadTestResult]) -> BTreeMap<String, LoadStats> {
    let mut peaks: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for step in steps {
        for result in &step.results {
            let (users, size) = peaks.entry(result.key()).or_default();
            *users = (*users).max(step.load.users().unwrap_or(0));
            *size = (*size).max(step.load.data_size().unwrap_or(0));
        }
    }

    let all: Vec<RequestResult> = steps
        .iter()
        .flat_map(|step| step.results.iter().cloned())
        .collect();

    Statistics::calculate(&all)
        .endpoint_stats
        .into_iter()
        .map(|(key, es)| {
            let (max_concurrent, max_data_size) = peaks.get(&key).copied().unwrap_or_default();
            let load_stats = LoadStats {
                average_latency: es.average_duration,
                p50_latency: es.p50_latency,
                p95_latency: es.p95_latency,
                p99_latency: es.p99_latency,
                requests_per_second: es.requests_per_second,
                success_rate: es.success_rate(),
                max_concurrent,
                max_data_size,
            };
            (key, load_stats)
        })
        .collect()
}
