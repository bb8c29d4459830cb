use crate::constants::MIN_DURATION_SENTINEL;
use crate::RequestResult;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationNanoSeconds};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Latency and throughput of a single `(method, url)` endpoint.
///
/// Duration-based fields only consider successful requests, i.e. requests which received a
/// response of any status. Endpoints without a single success report zero for all of them.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStatistics {
    pub url: String,
    pub method: String,
    pub total_requests: usize,
    pub success_requests: usize,
    pub failed_requests: usize,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub total_duration: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub average_duration: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub min_duration: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub max_duration: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub median_duration: Duration,
    /// `d[⌊len × 0.95⌋]` over the sorted successful durations.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub percentile_95: Duration,
    /// `d[⌊len × 0.99⌋]` over the sorted successful durations.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub percentile_99: Duration,
    /// Successful requests per second of *summed request time*, not of wall-clock time. Under
    /// concurrency above one this understates the observed request rate.
    pub requests_per_second: f64,
    pub status_codes: BTreeMap<u16, usize>,
    pub success_codes: usize,
    pub client_errors: usize,
    pub server_errors: usize,
    /// `d[len × 50 / 100]`
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p50_latency: Duration,
    /// `d[len × 95 / 100]`
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p95_latency: Duration,
    /// `d[len × 99 / 100]`
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub p99_latency: Duration,
}

impl EndpointStatistics {
    fn new(method: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            total_requests: 0,
            success_requests: 0,
            failed_requests: 0,
            total_duration: Duration::ZERO,
            average_duration: Duration::ZERO,
            min_duration: MIN_DURATION_SENTINEL,
            max_duration: Duration::ZERO,
            median_duration: Duration::ZERO,
            percentile_95: Duration::ZERO,
            percentile_99: Duration::ZERO,
            requests_per_second: 0.,
            status_codes: BTreeMap::new(),
            success_codes: 0,
            client_errors: 0,
            server_errors: 0,
            p50_latency: Duration::ZERO,
            p95_latency: Duration::ZERO,
            p99_latency: Duration::ZERO,
        }
    }

    fn record_success(&mut self, duration: Duration, status_code: u16) {
        self.success_requests += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);

        *self.status_codes.entry(status_code).or_default() += 1;
        match status_code {
            200..=299 => self.success_codes += 1,
            400..=499 => self.client_errors += 1,
            500..=u16::MAX => self.server_errors += 1,
            _ => {}
        }
    }

    fn finalize(&mut self, durations: &mut [Duration]) {
        if durations.is_empty() {
            self.min_duration = Duration::ZERO;
            self.max_duration = Duration::ZERO;
            return;
        }

        durations.sort_unstable();
        let len = durations.len();

        self.average_duration = average(self.total_duration, self.success_requests);
        self.median_duration = durations[len / 2];
        self.percentile_95 = durations[(len as f64 * 0.95) as usize];
        self.percentile_99 = durations[(len as f64 * 0.99) as usize];
        self.requests_per_second = if self.total_duration.is_zero() {
            0.
        } else {
            self.success_requests as f64 / self.total_duration.as_secs_f64()
        };

        self.p50_latency = nearest_rank(durations, 50);
        self.p95_latency = nearest_rank(durations, 95);
        self.p99_latency = nearest_rank(durations, 99);
    }

    /// Successful requests as a percentage of all requests.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.
        } else {
            self.success_requests as f64 / self.total_requests as f64 * 100.
        }
    }

    /// Failed requests as a percentage of all requests.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.
        } else {
            self.failed_requests as f64 / self.total_requests as f64 * 100.
        }
    }
}

/// Reduction of one batch of request results.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Keyed by `"METHOD URL"`.
    pub endpoint_stats: BTreeMap<String, EndpointStatistics>,
    pub total_requests: usize,
    /// Sum of successful request durations.
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    pub total_duration: Duration,
}

impl Statistics {
    pub fn calculate(results: &[RequestResult]) -> Self {
        let mut stats = Statistics::default();
        let mut durations: BTreeMap<String, Vec<Duration>> = BTreeMap::new();

        for result in results {
            let key = result.key();
            let endpoint = stats
                .endpoint_stats
                .entry(key.clone())
                .or_insert_with(|| EndpointStatistics::new(&result.method, &result.url));

            endpoint.total_requests += 1;
            stats.total_requests += 1;

            if !result.is_success() {
                endpoint.failed_requests += 1;
                continue;
            }

            endpoint.record_success(result.duration, result.status_code);
            stats.total_duration += result.duration;
            durations.entry(key).or_default().push(result.duration);
        }

        for (key, endpoint) in stats.endpoint_stats.iter_mut() {
            match durations.get_mut(key) {
                Some(durations) => endpoint.finalize(durations),
                None => endpoint.finalize(&mut []),
            }
        }

        stats
    }

    pub fn endpoint(&self, method: &str, url: &str) -> Option<&EndpointStatistics> {
        self.endpoint_stats.get(&crate::endpoint_key(method, url))
    }
}

/// Nearest-rank percentile by integer indexing, `pct` in `0..100`.
pub fn nearest_rank(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    sorted[(sorted.len() * pct / 100).min(sorted.len() - 1)]
}

/// Integer-truncated mean.
pub(crate) fn average(total: Duration, count: usize) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((total.as_nanos() / count as u128) as u64)
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance Test Summary")?;
        writeln!(f, "=======================")?;
        writeln!(f, "Total Requests: {}", self.total_requests)?;
        writeln!(f, "Total Duration: {:?}", self.total_duration)?;
        writeln!(f)?;

        for stat in self.endpoint_stats.values() {
            writeln!(f, "Endpoint: {} {}", stat.method, stat.url)?;
            writeln!(f, "------------------------")?;
            writeln!(f, "Total Requests:    {}", stat.total_requests)?;
            writeln!(f, "Successful:        {}", stat.success_requests)?;
            writeln!(f, "Failed:            {}", stat.failed_requests)?;
            writeln!(f, "Requests/second:   {:.2}", stat.requests_per_second)?;
            writeln!(f)?;
            writeln!(f, "Latency Statistics:")?;
            writeln!(f, "  Average:    {:?}", stat.average_duration)?;
            writeln!(f, "  Median:     {:?}", stat.median_duration)?;
            writeln!(f, "  Minimum:    {:?}", stat.min_duration)?;
            writeln!(f, "  Maximum:    {:?}", stat.max_duration)?;
            writeln!(f, "  95th %:     {:?}", stat.percentile_95)?;
            writeln!(f, "  99th %:     {:?}", stat.percentile_99)?;
            writeln!(f)?;
            writeln!(f, "Status Code Distribution:")?;
            for (code, count) in &stat.status_codes {
                writeln!(f, "  {code}: {count} requests")?;
            }
            writeln!(f, "  2xx Responses: {}", stat.success_codes)?;
            writeln!(f, "  4xx Responses: {}", stat.client_errors)?;
            writeln!(f, "  5xx Responses: {}", stat.server_errors)?;
            writeln!(f)?;
        }

        Ok(())
    }
}
