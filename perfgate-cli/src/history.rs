//! On-disk run history
//!
//! Every run is written to `<dir>/<test-type>/<run-id>.json`. Run ids are UTC timestamps, so the
//! lexicographically last performance file is the baseline of the next run. Performance runs also
//! append per-endpoint trend points to `<dir>/performance/summary.json`.
use anyhow::Context;
use perfgate::core::{
    Comparison, DegradationDetector, EndpointStatistics, LoadTestStats, Statistics,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

const SUMMARY_STEM: &str = "summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    Performance,
    UserLoad,
    DataLoad,
}

impl TestType {
    const ALL: [TestType; 3] = [TestType::Performance, TestType::UserLoad, TestType::DataLoad];

    fn dir_name(&self) -> &'static str {
        match self {
            TestType::Performance => "performance",
            TestType::UserLoad => "user-load",
            TestType::DataLoad => "data-load",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistory {
    pub run_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub statistics: Statistics,
    /// Endpoints present in both this run and the baseline.
    #[serde(default)]
    pub endpoints: BTreeMap<String, Comparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    pub degradation: bool,
    pub threshold_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestHistory {
    pub run_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub test_type: TestType,
    pub statistics: LoadTestStats,
}

/// One performance run of one endpoint, as tracked across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub run_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub total_requests: usize,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub rps: f64,
    /// Failed share of requests, in percent.
    pub error_rate_trend: f64,
}

impl TrendReport {
    fn new(run_id: &str, timestamp: OffsetDateTime, stats: &EndpointStatistics) -> Self {
        let ms = |d: std::time::Duration| d.as_secs_f64() * 1_000.;
        Self {
            run_id: run_id.to_string(),
            timestamp,
            total_requests: stats.total_requests,
            avg_latency_ms: ms(stats.average_duration),
            p50_latency_ms: ms(stats.p50_latency),
            p95_latency_ms: ms(stats.p95_latency),
            p99_latency_ms: ms(stats.p99_latency),
            rps: stats.requests_per_second,
            error_rate_trend: stats.error_rate(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_run: Option<OffsetDateTime>,
    pub run_count: usize,
    /// Run ids, oldest first.
    pub history: Vec<String>,
    /// Degradation verdict of the last run.
    pub degradation: bool,
    /// Latest trend point per endpoint.
    pub trends: BTreeMap<String, TrendReport>,
    pub endpoint_history: BTreeMap<String, Vec<TrendReport>>,
}

impl Summary {
    fn record(&mut self, history: &TestHistory) {
        self.last_run = Some(history.timestamp);
        self.run_count += 1;
        self.history.push(history.run_id.clone());
        self.degradation = history.degradation;

        for (endpoint, stats) in &history.statistics.endpoint_stats {
            let trend = TrendReport::new(&history.run_id, history.timestamp, stats);
            debug!(
                "Trend for {endpoint}: avg {:.2} ms, p95 {:.2} ms, {:.2} RPS",
                trend.avg_latency_ms, trend.p95_latency_ms, trend.rps
            );
            self.endpoint_history
                .entry(endpoint.clone())
                .or_default()
                .push(trend.clone());
            self.trends.insert(endpoint.clone(), trend);
        }
    }
}

pub struct HistoryStore {
    base_dir: PathBuf,
}

impl HistoryStore {
    pub fn open(base_dir: &Path) -> anyhow::Result<Self> {
        for test_type in TestType::ALL {
            let dir = base_dir.join(test_type.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create history directory {}", dir.display()))?;
        }
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Most recent performance run, if any. A baseline that cannot be parsed is an error.
    pub fn latest(&self) -> anyhow::Result<Option<TestHistory>> {
        let Some(path) = self.run_files(TestType::Performance)?.pop() else {
            return Ok(None);
        };

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read baseline {}", path.display()))?;
        let history = serde_json::from_str(&data)
            .with_context(|| format!("Corrupt baseline {}", path.display()))?;
        Ok(Some(history))
    }

    /// Compare `statistics` against the latest run and persist it as the new latest run.
    pub fn save_results(
        &self,
        statistics: Statistics,
        detector: &DegradationDetector,
    ) -> anyhow::Result<TestHistory> {
        let baseline = self.latest()?;
        let timestamp = OffsetDateTime::now_utc();

        let mut history = TestHistory {
            run_id: self.next_run_id(TestType::Performance, timestamp)?,
            timestamp,
            statistics,
            endpoints: BTreeMap::new(),
            baseline_id: None,
            degradation: false,
            threshold_pct: detector.threshold_pct(),
        };

        if let Some(baseline) = baseline {
            let outcome = detector.compare(&history.statistics, &baseline.statistics);
            history.endpoints = outcome.endpoints;
            history.degradation = outcome.degradation;
            history.baseline_id = Some(baseline.run_id);
        }

        self.write(TestType::Performance, &history.run_id, &history)?;

        let mut summary = self.summary()?;
        summary.record(&history);
        self.write(TestType::Performance, SUMMARY_STEM, &summary)?;
        info!("Performance summary covers {} runs", summary.run_count);

        Ok(history)
    }

    /// Trend summary of all performance runs. Empty before the first run.
    pub fn summary(&self) -> anyhow::Result<Summary> {
        let path = self
            .base_dir
            .join(TestType::Performance.dir_name())
            .join(format!("{SUMMARY_STEM}.json"));
        if !path.exists() {
            return Ok(Summary::default());
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read summary {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Corrupt summary {}", path.display()))
    }

    pub fn save_load_results(
        &self,
        statistics: &LoadTestStats,
        test_type: TestType,
    ) -> anyhow::Result<LoadTestHistory> {
        let timestamp = OffsetDateTime::now_utc();
        let history = LoadTestHistory {
            run_id: self.next_run_id(test_type, timestamp)?,
            timestamp,
            test_type,
            statistics: statistics.clone(),
        };

        self.write(test_type, &history.run_id, &history)?;
        Ok(history)
    }

    fn run_files(&self, test_type: TestType) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.base_dir.join(test_type.dir_name());
        let mut files = vec![];
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to list history directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && path.file_stem().is_some_and(|stem| stem != SUMMARY_STEM)
            {
                files.push(path);
            }
        }
        // NOTE: Suffixed ids must sort after their unsuffixed run, so compare stems
        files.sort_by(|a, b| a.file_stem().cmp(&b.file_stem()));
        Ok(files)
    }

    /// Timestamp id, suffixed when a run with the same second already exists.
    fn next_run_id(&self, test_type: TestType, timestamp: OffsetDateTime) -> anyhow::Result<String> {
        let base = timestamp
            .format(format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format run id")?;

        let dir = self.base_dir.join(test_type.dir_name());
        let mut run_id = base.clone();
        let mut suffix = 1;
        while dir.join(format!("{run_id}.json")).exists() {
            run_id = format!("{base}-{suffix:03}");
            suffix += 1;
        }
        Ok(run_id)
    }

    fn write<T: Serialize>(
        &self,
        test_type: TestType,
        name: &str,
        value: &T,
    ) -> anyhow::Result<PathBuf> {
        let path = self
            .base_dir
            .join(test_type.dir_name())
            .join(format!("{name}.json"));
        let data = serde_json::to_string_pretty(value)?;
        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved {} history to {}", test_type.dir_name(), path.display());
        debug!("Wrote {name}");
        Ok(path)
    }
}
