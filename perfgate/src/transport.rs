//! HTTP transport seam
//!
//! The load generators never talk to `reqwest` directly. They ask a [`Connector`] for a
//! [`Transport`] sized for their use: one shared pool per benchmark run, one single-connection
//! client per virtual user.
use crate::transaction;
use crate::PerfError;
use perfgate_core::{
    RequestError, RequestResult, RunConfig, Task, UserLoadConfig, DEFAULT_USER_IDLE_TIMEOUT,
};
use reqwest::Method;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

/// Connection settings a transport is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientProfile {
    pub max_idle_per_host: usize,
    pub timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub send_body: bool,
}

impl ClientProfile {
    /// Shared client of a worker pool; keeps one idle connection per worker.
    pub fn pool(config: &RunConfig) -> Self {
        Self {
            max_idle_per_host: config.thread_count,
            timeout: config.request_timeout,
            idle_timeout: None,
            send_body: config.send_body,
        }
    }

    /// Private client of a single virtual user.
    pub fn virtual_user(config: &UserLoadConfig, send_body: bool) -> Self {
        Self {
            max_idle_per_host: 1,
            timeout: config.request_timeout,
            idle_timeout: Some(DEFAULT_USER_IDLE_TIMEOUT),
            send_body,
        }
    }
}

#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Issue the request described by `task` and read the whole response.
    ///
    /// Returns the response status. Any status, including 5xx, is a successful exchange.
    async fn execute(&self, task: &Task) -> Result<u16, RequestError>;
}

/// Builds transports for a given [`ClientProfile`].
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + Send + Sync + 'static;

    fn connect(&self, profile: ClientProfile) -> Result<Self::Transport, PerfError>;
}

/// `reqwest` backed [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self, profile: ClientProfile) -> Result<HttpTransport, PerfError> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(profile.max_idle_per_host)
            .timeout(profile.timeout);
        if let Some(idle_timeout) = profile.idle_timeout {
            builder = builder.pool_idle_timeout(idle_timeout);
        }

        Ok(HttpTransport {
            client: builder.build()?,
            send_body: profile.send_body,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    send_body: bool,
}

impl Transport for HttpTransport {
    async fn execute(&self, task: &Task) -> Result<u16, RequestError> {
        let method = Method::from_bytes(task.method.as_bytes())
            .map_err(|err| RequestError::InvalidRequest(err.to_string()))?;

        let mut request = self.client.request(method, task.url.as_str());
        for (name, value) in &task.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if self.send_body {
            if let Some(body) = &task.body {
                request = request.body(body.clone());
            }
        }

        let response = request.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        response.bytes().await.map_err(request_error)?;

        Ok(status)
    }
}

fn request_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        RequestError::Timeout
    } else if err.is_connect() {
        RequestError::Connect(err.to_string())
    } else if err.is_builder() {
        RequestError::InvalidRequest(err.to_string())
    } else {
        RequestError::Transport(err.to_string())
    }
}

/// Execute one task and time it, from just before the call until the response is consumed.
pub(crate) async fn timed<T: Transport + ?Sized>(
    transport: &T,
    task: &Task,
    worker_id: usize,
) -> RequestResult {
    let start_time = OffsetDateTime::now_utc();
    let start = Instant::now();

    let outcome = Transport::execute(transport, task).await;

    let duration = start.elapsed();
    let end_time = OffsetDateTime::now_utc();

    let (status_code, error) = match outcome {
        Ok(status) => (status, None),
        Err(err) => (0, Some(err)),
    };

    let result = RequestResult {
        url: task.url.clone(),
        method: task.method.clone(),
        status_code,
        duration,
        error,
        worker_id,
        start_time,
        end_time,
    };
    transaction::record(&result);
    result
}
