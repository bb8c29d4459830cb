mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use perfgate::prelude::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn user_ramp_against_live_service() {
        let addr = init().await;
        let tasks = vec![
            Task::new("GET", &format!("http://{addr}/delay/ms/5")),
            Task::new("GET", &format!("http://{addr}/status/204")),
        ];
        let runner = Runner::new(tasks, RunConfig::default()).unwrap();
        let config = UserLoadConfig {
            start_users: 1,
            max_users: 3,
            step_users: 2,
            duration_per_step: Duration::from_secs(1),
            cool_down: Duration::from_millis(200),
            stagger: Duration::from_millis(10),
            think_time_min: Duration::from_millis(10),
            think_time_max: Duration::from_millis(50),
            monitor_interval: Duration::from_millis(250),
            collect_during_step: true,
            ..Default::default()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].load, StepLoad::Users(1));
        assert_eq!(steps[1].load, StepLoad::Users(3));
        for step in &steps {
            assert!(!step.results.is_empty());
            assert!(step.results.iter().all(|r| r.is_success()));
            assert!(step.elapsed >= Duration::from_secs(1));
        }

        let stats = LoadTestStats::calculate(&steps);
        assert_eq!(stats.steps.len(), 2);
        assert_eq!(
            stats.total_requests,
            steps.iter().map(|s| s.results.len()).sum::<usize>()
        );
        assert!(stats.steps.iter().all(|s| s.success_rate == 100.));
        assert!(stats.test_duration >= Duration::from_secs(2));
        assert!(stats.min_latency <= stats.max_latency);
        assert!(stats.endpoint_stats.values().all(|e| e.max_concurrent == 3));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn user_step_keeps_what_fits_in_its_buffer() {
        let addr = init().await;
        let tasks = vec![
            Task::new("GET", &format!("http://{addr}/delay/ms/1")),
            Task::new("GET", &format!("http://{addr}/status/204")),
        ];
        let runner = Runner::new(tasks, RunConfig::default()).unwrap();
        let config = UserLoadConfig {
            start_users: 2,
            max_users: 2,
            duration_per_step: Duration::from_secs(1),
            stagger: Duration::from_millis(10),
            think_time_min: Duration::from_millis(10),
            think_time_max: Duration::from_millis(20),
            ..Default::default()
        };

        let steps = runner.run_user_load(&config).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].results.len(), 4);
        assert!(steps[0].dropped > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn data_ramp_against_live_service() {
        let addr = init().await;
        let tasks = vec![
            Task::new("GET", &format!("http://{addr}/delay/ms/1")),
            Task::new("GET", &format!("http://{addr}/status/500")),
        ];
        let runner = Runner::new(tasks, RunConfig::new(8, 1)).unwrap();
        let config = DataLoadConfig {
            initial_data_size: 1_000,
            max_data_size: 5_000,
            cool_down: Duration::from_millis(100),
            ..Default::default()
        };

        let steps = runner.run_data_load(&config).await.unwrap();
        let sizes: Vec<_> = steps.iter().map(|s| s.load).collect();
        assert_eq!(sizes, vec![StepLoad::DataSize(1_000), StepLoad::DataSize(5_000)]);
        assert!(steps.iter().all(|s| s.results.len() == 2 * 50));

        let stats = LoadTestStats::calculate(&steps);
        assert_eq!(stats.total_requests, 200);
        assert!(stats
            .endpoint_stats
            .values()
            .all(|e| e.max_data_size == 5_000 && e.max_concurrent == 0));
    }
}
