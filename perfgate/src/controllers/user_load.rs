use crate::buffer::{step_buffer, BufferProducer};
use crate::timer::Ticker;
use crate::transport::{timed, ClientProfile, Connector, Transport};
use crate::{PerfError, Runner};
use perfgate_core::{LoadTestResult, StepLoad, Task, UserLoadConfig};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::ops::Range;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

impl<C: Connector> Runner<C> {
    /// Ramp the number of concurrent virtual users from `start_users` to `max_users`.
    ///
    /// Each step runs for `duration_per_step` and yields one [`LoadTestResult`]. Virtual users
    /// pick tasks at random and pause for a random think-time between requests.
    ///
    /// A step keeps what fits in its buffer, drained once the users stop, unless
    /// [`UserLoadConfig::collect_during_step`] is set.
    pub async fn run_user_load(
        &self,
        config: &UserLoadConfig,
    ) -> Result<Vec<LoadTestResult>, PerfError> {
        self.user_ramp(config).instrument(self.span.clone()).await
    }

    #[instrument(name = "user_load", skip_all, fields(start = config.start_users, max = config.max_users, step = config.step_users))]
    async fn user_ramp(&self, config: &UserLoadConfig) -> Result<Vec<LoadTestResult>, PerfError> {
        config.validate()?;

        let total_steps = config.total_steps();
        info!("Running {total_steps} user load steps");

        let mut steps = Vec::with_capacity(total_steps);
        for (index, users) in config.user_counts().enumerate() {
            let step_number = index + 1;
            steps.push(self.user_step(config, step_number, users).await?);

            if step_number < total_steps {
                debug!("Cooling down for {:?}", config.cool_down);
                sleep(config.cool_down).await;
            }
        }

        info!("User load test complete");
        Ok(steps)
    }

    #[instrument(name = "step", skip_all, fields(step = step_number, users = users))]
    async fn user_step(
        &self,
        config: &UserLoadConfig,
        step_number: usize,
        users: usize,
    ) -> Result<LoadTestResult, PerfError> {
        info!("Step {step_number}: {users} users for {:?}", config.duration_per_step);

        let capacity = config
            .buffer_capacity
            .unwrap_or(users * self.tasks.len());
        let token = CancellationToken::new();
        let (producer, buffer) = step_buffer(capacity, config.overflow_policy, token.clone());

        let collector = config.collect_during_step.then(|| {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                let mut results = vec![];
                while let Ok(result) = buffer.recv().await {
                    results.push(result);
                }
                results
            })
        });

        let counters = Arc::new(StepCounters::default());
        let started = Instant::now();

        let mut set = JoinSet::new();
        for user_id in 0..users {
            let profile = ClientProfile::virtual_user(config, self.config.send_body);
            let user = VirtualUser {
                id: user_id,
                tasks: self.tasks.clone(),
                transport: self.connector.connect(profile)?,
                producer: producer.clone(),
                token: token.clone(),
                counters: counters.clone(),
                stagger: config.stagger.saturating_mul(user_id as u32),
                think_time: config.think_time_min..config.think_time_max,
            };
            set.spawn(user.run().in_current_span());
        }

        tokio::select! {
            _ = sleep(config.duration_per_step) => {}
            _ = monitor(&counters, config.monitor_interval) => {}
        }

        token.cancel();
        while let Some(joined) = set.join_next().await {
            joined?;
        }
        let elapsed = started.elapsed();

        let dropped = producer.dropped();
        drop(producer);
        let results = match collector {
            Some(collector) => collector.await?,
            None => {
                let mut results = Vec::with_capacity(buffer.len());
                while let Ok(result) = buffer.try_recv() {
                    results.push(result);
                }
                results
            }
        };

        if dropped > 0 {
            warn!("{dropped} results dropped by the step buffer");
        }
        info!(
            "Step {step_number} complete: {} results in {elapsed:?}",
            results.len()
        );

        Ok(LoadTestResult {
            load: StepLoad::Users(users),
            results,
            timestamp: OffsetDateTime::now_utc(),
            step_number,
            elapsed,
            dropped,
        })
    }
}

#[derive(Default)]
struct StepCounters {
    active: AtomicUsize,
    requests: AtomicU64,
    accepted: AtomicU64,
}

/// Keeps `StepCounters::active` accurate for as long as a virtual user runs.
struct ActiveGuard(Arc<StepCounters>);

impl ActiveGuard {
    fn new(counters: Arc<StepCounters>) -> Self {
        counters.active.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
    }
}

struct VirtualUser<T> {
    id: usize,
    tasks: Arc<[Task]>,
    transport: T,
    producer: BufferProducer,
    token: CancellationToken,
    counters: Arc<StepCounters>,
    stagger: Duration,
    think_time: Range<Duration>,
}

impl<T: Transport + Sync> VirtualUser<T> {
    async fn run(self) {
        let _active = ActiveGuard::new(self.counters.clone());
        let mut rng = SmallRng::from_entropy();

        if !self.pause(self.stagger).await {
            return;
        }
        trace!("Virtual user {} started", self.id);

        while !self.token.is_cancelled() {
            let task = &self.tasks[rng.gen_range(0..self.tasks.len())];
            let result = timed(&self.transport, task, self.id).await;

            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            if self.producer.push(result).await {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
            }

            let think_time = rng.gen_range(self.think_time.clone());
            if !self.pause(think_time).await {
                break;
            }
        }
        trace!("Virtual user {} stopped", self.id);
    }

    /// Sleep unless the step ends first. Returns `false` if it did.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }
}

async fn monitor(counters: &StepCounters, period: Duration) {
    let mut ticker = Ticker::new(period).await;
    let mut last_requests = 0;
    loop {
        let elapsed = ticker.tick().await;
        let requests = counters.requests.load(Ordering::Relaxed);
        let rps = (requests - last_requests) as f64 / period.as_secs_f64();
        last_requests = requests;

        info!(
            active = counters.active.load(Ordering::Relaxed),
            requests,
            accepted = counters.accepted.load(Ordering::Relaxed),
            "{rps:.2} RPS after {elapsed:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnector;
    use perfgate_core::{ConfigError, OverflowPolicy, RunConfig};

    fn tasks() -> Vec<Task> {
        vec![
            Task::new("GET", "http://svc/a"),
            Task::new("GET", "http://svc/b"),
        ]
    }

    fn config() -> UserLoadConfig {
        UserLoadConfig {
            start_users: 1,
            max_users: 3,
            step_users: 1,
            duration_per_step: Duration::from_secs(2),
            cool_down: Duration::from_secs(1),
            stagger: Duration::from_millis(10),
            think_time_min: Duration::from_millis(100),
            think_time_max: Duration::from_millis(200),
            monitor_interval: Duration::from_millis(500),
            ..Default::default()
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn ramps_users_step_by_step() {
        let mock = MockConnector::with_latency(Duration::from_millis(20));
        let runner = Runner::with_connector(tasks(), RunConfig::default(), mock.clone()).unwrap();

        let started = Instant::now();
        let steps = runner.run_user_load(&config()).await.unwrap();
        let elapsed = started.elapsed();

        let loads: Vec<_> = steps.iter().map(|s| s.load).collect();
        assert_eq!(
            loads,
            vec![StepLoad::Users(1), StepLoad::Users(2), StepLoad::Users(3)]
        );

        for (index, step) in steps.iter().enumerate() {
            let users = index + 1;
            assert_eq!(step.step_number, users);
            assert!(step.elapsed >= Duration::from_secs(2));
            // Buffer of users × tasks, filled long before the step ends
            assert_eq!(step.results.len(), users * 2);
            assert!(step.dropped > 0);
            assert!(step.results.iter().all(|r| r.worker_id < users));
        }
        assert!(logs_contain("dropping newest result"));

        // Three steps, two cool-downs
        assert!(elapsed >= Duration::from_secs(8));
        assert!(elapsed < Duration::from_secs(9));

        let profiles = mock.profiles();
        assert_eq!(profiles.len(), 1 + 2 + 3);
        assert!(profiles.iter().all(|p| p.max_idle_per_host == 1));
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5000)]
    async fn keeps_buffer_capacity_per_step() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let tasks = vec![Task::new("GET", "http://svc/a")];
        let runner = Runner::with_connector(tasks, RunConfig::default(), mock).unwrap();
        let config = UserLoadConfig {
            start_users: 1,
            max_users: 1,
            duration_per_step: Duration::from_secs(30),
            ..Default::default()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert!(steps[0].results.len() <= 1);
        assert!(steps[0].dropped > 0);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5000)]
    async fn collecting_during_step_keeps_every_result() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let tasks = vec![Task::new("GET", "http://svc/a")];
        let runner = Runner::with_connector(tasks, RunConfig::default(), mock).unwrap();
        let config = UserLoadConfig {
            start_users: 1,
            max_users: 1,
            duration_per_step: Duration::from_secs(30),
            collect_during_step: true,
            ..Default::default()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps[0].dropped, 0);
        // Think-time of at most a second leaves room for at least 29 requests
        assert!(steps[0].results.len() >= 29);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5000)]
    async fn block_policy_keeps_every_result() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let runner = Runner::with_connector(tasks(), RunConfig::default(), mock).unwrap();
        let config = UserLoadConfig {
            start_users: 4,
            max_users: 4,
            buffer_capacity: Some(1),
            overflow_policy: OverflowPolicy::Block,
            collect_during_step: true,
            ..config()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].dropped, 0);
        assert!(steps[0].results.len() > 1);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5000)]
    async fn block_policy_without_collector_ends_the_step() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let runner = Runner::with_connector(tasks(), RunConfig::default(), mock).unwrap();
        let config = UserLoadConfig {
            start_users: 2,
            max_users: 2,
            buffer_capacity: Some(1),
            overflow_policy: OverflowPolicy::Block,
            ..config()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps[0].results.len(), 1);
        // Each user stalls on a full buffer until the step ends
        assert_eq!(steps[0].dropped, 2);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(5000)]
    async fn stops_users_waiting_out_their_stagger() {
        let mock = MockConnector::with_latency(Duration::from_millis(5));
        let runner = Runner::with_connector(tasks(), RunConfig::default(), mock.clone()).unwrap();
        let config = UserLoadConfig {
            start_users: 3,
            max_users: 3,
            stagger: Duration::from_secs(10),
            ..config()
        };

        let started = Instant::now();
        let steps = runner.run_user_load(&config).await.unwrap();

        // Only the first user starts before the two second step ends
        assert!(steps[0].results.iter().all(|r| r.worker_id == 0));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(mock.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_ramp() {
        let runner =
            Runner::with_connector(tasks(), RunConfig::default(), MockConnector::default())
                .unwrap();
        let config = UserLoadConfig {
            start_users: 10,
            max_users: 5,
            ..Default::default()
        };

        let err = runner.run_user_load(&config).await.unwrap_err();
        assert!(matches!(
            err,
            PerfError::Config(ConfigError::UserRange { start: 10, max: 5 })
        ));
    }
}
