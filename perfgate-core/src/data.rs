use crate::RequestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// One HTTP call to be issued repeatedly during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl Task {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Key the statistics are grouped under.
    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.url)
    }
}

pub fn endpoint_key(method: &str, url: &str) -> String {
    format!("{method} {url}")
}

/// Outcome of one executed request.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub url: String,
    pub method: String,
    /// Zero when `error` is set.
    pub status_code: u16,
    pub duration: Duration,
    pub error: Option<RequestError>,
    pub worker_id: usize,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
}

impl RequestResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn key(&self) -> String {
        endpoint_key(&self.method, &self.url)
    }
}

/// Load level a ramp step ran at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepLoad {
    Users(usize),
    DataSize(usize),
}

impl StepLoad {
    pub fn users(&self) -> Option<usize> {
        match self {
            StepLoad::Users(n) => Some(*n),
            StepLoad::DataSize(_) => None,
        }
    }

    pub fn data_size(&self) -> Option<usize> {
        match self {
            StepLoad::DataSize(n) => Some(*n),
            StepLoad::Users(_) => None,
        }
    }
}

impl fmt::Display for StepLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLoad::Users(n) => write!(f, "{n} users"),
            StepLoad::DataSize(n) => write!(f, "{n} records"),
        }
    }
}

/// Raw results of one ramp step.
#[derive(Debug, Clone)]
pub struct LoadTestResult {
    pub load: StepLoad,
    pub results: Vec<RequestResult>,
    /// When the step finished.
    pub timestamp: OffsetDateTime,
    pub step_number: usize,
    /// Wall-clock time the step ran for, excluding cool-down.
    pub elapsed: Duration,
    /// Results rejected or evicted by the step buffer.
    pub dropped: u64,
}
