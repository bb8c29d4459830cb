use humantime::format_duration;
use perfgate::core::{Comparison, LoadTestStats, StepLoad};
use std::collections::BTreeMap;
use std::fmt;

/// Step table of a ramp test.
pub struct LoadSummary<'a> {
    title: &'a str,
    stats: &'a LoadTestStats,
}

impl<'a> LoadSummary<'a> {
    pub fn new(title: &'a str, stats: &'a LoadTestStats) -> Self {
        Self { title, stats }
    }
}

impl fmt::Display for LoadSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        writeln!(f)?;
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.len()))?;
        writeln!(f, "Total Duration: {}", format_duration(stats.test_duration))?;
        writeln!(f, "Total Requests: {}", stats.total_requests)?;
        writeln!(
            f,
            "Overall Average Latency: {}",
            format_duration(stats.average_latency)
        )?;
        writeln!(
            f,
            "Latency Range: {} .. {}",
            format_duration(stats.min_latency),
            format_duration(stats.max_latency)
        )?;
        writeln!(f)?;

        writeln!(f, "Step-by-Step Results:")?;
        writeln!(f, "-------------------")?;
        for step in &stats.steps {
            match step.load {
                StepLoad::Users(users) => writeln!(f, "Concurrent Users: {users}")?,
                StepLoad::DataSize(size) => writeln!(f, "Data Size: {size} records")?,
            }
            writeln!(f, "  Average Latency: {}", format_duration(step.average_latency))?;
            writeln!(f, "  Requests/sec: {:.2}", step.requests_per_second)?;
            writeln!(f, "  Success Rate: {:.2}%", step.success_rate)?;
            writeln!(f, "  Error Rate: {:.2}%", step.error_rate)?;
            if step.dropped > 0 {
                writeln!(f, "  Dropped Results: {}", step.dropped)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Regressed endpoints of a performance run.
pub struct DegradationSummary<'a> {
    baseline_id: &'a str,
    endpoints: &'a BTreeMap<String, Comparison>,
}

impl<'a> DegradationSummary<'a> {
    pub fn new(baseline_id: &'a str, endpoints: &'a BTreeMap<String, Comparison>) -> Self {
        Self {
            baseline_id,
            endpoints,
        }
    }
}

impl fmt::Display for DegradationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Performance Comparison (Baseline: {})", self.baseline_id)?;
        for (endpoint, comparison) in self.endpoints.iter().filter(|(_, c)| c.degradation) {
            let changes = &comparison.changes;
            writeln!(f)?;
            writeln!(f, "Endpoint: {endpoint}")?;
            writeln!(f, "  Latency Increase: {}%", signed(changes.latency_increase))?;
            writeln!(f, "  Error Rate Increase: {}%", signed(changes.error_rate_increase))?;
            writeln!(f, "  Throughput Decrease: {}%", signed(changes.throughput_decrease))?;
            writeln!(
                f,
                "  Success Rate Decrease: {}%",
                signed(changes.success_rate_decrease)
            )?;
        }
        Ok(())
    }
}

fn signed(value: f64) -> String {
    if value > 0. {
        format!("+{value:.2}")
    } else {
        format!("{value:.2}")
    }
}
