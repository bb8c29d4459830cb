//! Fixed worker pool
use crate::timer::Ticker;
use crate::transport::{timed, ClientProfile, Connector, HttpConnector};
use crate::PerfError;
use perfgate_core::{ConfigError, RequestResult, RunConfig, Task, PROGRESS_INTERVAL};
use std::sync::Arc;
use tokio::task::JoinSet;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument, Span};

/// Entry point for every kind of run.
///
/// A `Runner` owns the task list, the pool configuration and the [`Connector`] used to build HTTP
/// clients. All of its log output is emitted below the span given to [`Runner::with_span`].
///
/// # Example
/// ```no_run
/// use perfgate::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), PerfError> {
///     let tasks = vec![Task::new("GET", "http://localhost:8080/health")];
///     let runner = Runner::new(tasks, RunConfig::new(4, 100))?;
///
///     let results = runner.run().await?;
///     println!("{}", Statistics::calculate(&results));
///     Ok(())
/// }
/// ```
pub struct Runner<C = HttpConnector> {
    pub(crate) tasks: Arc<[Task]>,
    pub(crate) config: RunConfig,
    pub(crate) connector: Arc<C>,
    pub(crate) span: Span,
}

impl Runner<HttpConnector> {
    pub fn new(tasks: Vec<Task>, config: RunConfig) -> Result<Self, PerfError> {
        Self::with_connector(tasks, config, HttpConnector)
    }
}

impl<C: Connector> Runner<C> {
    /// Build a runner issuing its requests through a custom [`Connector`].
    pub fn with_connector(
        tasks: Vec<Task>,
        config: RunConfig,
        connector: C,
    ) -> Result<Self, PerfError> {
        if tasks.is_empty() {
            return Err(ConfigError::NoTasks.into());
        }
        config.validate()?;

        Ok(Self {
            tasks: tasks.into(),
            config,
            connector: Arc::new(connector),
            span: Span::none(),
        })
    }

    /// Parent span for everything this runner logs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute every task `request_count` times across `thread_count` workers.
    ///
    /// Returns one [`RequestResult`] per request, in completion order. Failed requests are
    /// returned like any other result.
    pub async fn run(&self) -> Result<Vec<RequestResult>, PerfError> {
        self.run_with_count(self.config.request_count)
            .instrument(self.span.clone())
            .await
    }

    #[instrument(name = "benchmark", skip_all, fields(tasks = self.tasks.len(), threads = self.config.thread_count, requests = count))]
    pub(crate) async fn run_with_count(
        &self,
        count: usize,
    ) -> Result<Vec<RequestResult>, PerfError> {
        let workers = self.config.thread_count;
        let total = self.tasks.len() * count;
        info!("Running {total} requests on {workers} workers");

        let transport = Arc::new(self.connector.connect(ClientProfile::pool(&self.config))?);
        let (work_tx, work_rx) = async_channel::bounded::<usize>(workers);
        let (result_tx, result_rx) = async_channel::unbounded::<RequestResult>();

        let mut set = JoinSet::new();

        let task_count = self.tasks.len();
        set.spawn(
            async move {
                for index in 0..task_count {
                    for _ in 0..count {
                        if work_tx.send(index).await.is_err() {
                            error!("Work queue closed with requests pending");
                            return;
                        }
                    }
                }
            }
            .in_current_span(),
        );

        for worker_id in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let tasks = self.tasks.clone();
            let transport = transport.clone();

            set.spawn(
                async move {
                    debug!("Worker {worker_id} started");
                    while let Ok(index) = work_rx.recv().await {
                        let result = timed(transport.as_ref(), &tasks[index], worker_id).await;
                        if let Some(err) = &result.error {
                            warn!("{} {} failed: {err}", result.method, result.url);
                        }
                        if result_tx.send(result).await.is_err() {
                            break;
                        }
                    }
                    debug!("Worker {worker_id} finished");
                }
                .in_current_span(),
            );
        }
        // NOTE: The result channel closes once every worker has dropped its sender
        drop(work_rx);
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        let mut ticker = Ticker::new(PROGRESS_INTERVAL).await;
        loop {
            tokio::select! {
                received = result_rx.recv() => match received {
                    Ok(result) => results.push(result),
                    Err(_) => break,
                },
                elapsed = ticker.tick() => {
                    let percent = results.len() as f64 / total as f64 * 100.;
                    info!("Progress: {}/{total} ({percent:.1}%) after {elapsed:?}", results.len());
                }
            }
        }

        while let Some(joined) = set.join_next().await {
            joined?;
        }

        info!("Completed {} requests", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnector;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn tasks() -> Vec<Task> {
        vec![
            Task::new("GET", "http://svc/a"),
            Task::new("GET", "http://svc/b"),
            Task::new("POST", "http://svc/a"),
        ]
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn runs_every_task_request_count_times() {
        let mock = MockConnector::with_latency(Duration::from_millis(25));
        let runner = Runner::with_connector(tasks(), RunConfig::new(4, 7), mock.clone()).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 21);

        let mut per_endpoint = BTreeMap::new();
        for result in &results {
            *per_endpoint.entry(result.key()).or_insert(0) += 1;
            assert!(result.worker_id < 4);
            assert!(result.is_success());
        }
        assert_eq!(per_endpoint.len(), 3);
        assert!(per_endpoint.values().all(|count| *count == 7));

        assert!(mock.peak_in_flight() <= 4);
        assert_eq!(mock.profiles().len(), 1);
        assert_eq!(mock.profiles()[0].max_idle_per_host, 4);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(1000)]
    async fn dispatches_each_task_before_the_next() {
        let tasks = vec![
            Task::new("GET", "http://svc/a"),
            Task::new("GET", "http://svc/b"),
        ];
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let runner = Runner::with_connector(tasks, RunConfig::new(1, 3), mock).unwrap();

        let results = runner.run().await.unwrap();
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://svc/a",
                "http://svc/a",
                "http://svc/a",
                "http://svc/b",
                "http://svc/b",
                "http://svc/b",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_abort_the_pool() {
        let tasks = vec![
            Task::new("GET", "http://svc/ok"),
            Task::new("GET", "http://svc/fail"),
        ];
        let mock = MockConnector::with_latency(Duration::from_millis(10));
        let runner = Runner::with_connector(tasks, RunConfig::new(2, 5), mock).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 5);
        assert!(results
            .iter()
            .filter(|r| !r.is_success())
            .all(|r| r.url.ends_with("/fail") && r.status_code == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_count_leaves_config_untouched() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let runner = Runner::with_connector(tasks(), RunConfig::new(2, 1), mock).unwrap();

        let results = runner.run_with_count(4).await.unwrap();
        assert_eq!(results.len(), 12);
        assert_eq!(runner.config().request_count, 1);
    }

    #[test]
    fn rejects_invalid_input() {
        let empty = Runner::with_connector(vec![], RunConfig::new(1, 1), MockConnector::default());
        assert!(matches!(
            empty,
            Err(PerfError::Config(ConfigError::NoTasks))
        ));

        let no_threads =
            Runner::with_connector(tasks(), RunConfig::new(0, 1), MockConnector::default());
        assert!(matches!(
            no_threads,
            Err(PerfError::Config(ConfigError::ZeroThreads))
        ));
    }
}
