mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use perfgate::core::RequestError;
    use perfgate::prelude::*;
    use std::time::Duration;
    use time::OffsetDateTime;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn runs_every_task_against_live_service() {
        let addr = init().await;
        let tasks = vec![
            Task::new("GET", &format!("http://{addr}/delay/ms/1")),
            Task::new("GET", &format!("http://{addr}/status/200")),
            Task::new("GET", &format!("http://{addr}/status/503")),
        ];
        let runner = Runner::new(tasks, RunConfig::new(4, 5)).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 15);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(results.iter().all(|r| r.worker_id < 4));

        let stats = Statistics::calculate(&results);
        assert_eq!(stats.total_requests, 15);

        let unavailable = stats
            .endpoint("GET", &format!("http://{addr}/status/503"))
            .unwrap();
        assert_eq!(unavailable.success_requests, 5);
        assert_eq!(unavailable.server_errors, 5);
        assert_eq!(unavailable.status_codes.get(&503), Some(&5));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn timeouts_degrade_against_clean_baseline() {
        let addr = init().await;
        let fast = format!("http://{addr}/delay/ms/5");
        let flaky = format!("http://{addr}/alternate/degradation/delay/ms/1000");
        let tasks = vec![Task::new("GET", &fast), Task::new("GET", &flaky)];
        let config = RunConfig {
            request_timeout: Duration::from_millis(200),
            ..RunConfig::new(4, 10)
        };
        let runner = Runner::new(tasks, config).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 20);

        let current = Statistics::calculate(&results);
        let fast_stats = current.endpoint("GET", &fast).unwrap();
        assert_eq!(fast_stats.total_requests, 10);
        assert_eq!(fast_stats.success_requests, 10);

        let flaky_stats = current.endpoint("GET", &flaky).unwrap();
        assert_eq!(flaky_stats.total_requests, 10);
        assert_eq!(flaky_stats.success_requests, 5);
        assert_eq!(flaky_stats.failed_requests, 5);
        assert!(results
            .iter()
            .filter(|r| !r.is_success())
            .all(|r| r.error == Some(RequestError::Timeout)));

        // Same endpoints, every request answered in 5ms
        let now = OffsetDateTime::now_utc();
        let clean: Vec<_> = [&fast, &flaky]
            .into_iter()
            .flat_map(|url| {
                (0..10).map(move |_| RequestResult {
                    url: url.clone(),
                    method: "GET".to_string(),
                    status_code: 200,
                    duration: Duration::from_millis(5),
                    error: None,
                    worker_id: 0,
                    start_time: now,
                    end_time: now,
                })
            })
            .collect();
        let baseline = Statistics::calculate(&clean);

        let outcome = DegradationDetector::default().compare(&current, &baseline);
        assert!(outcome.degradation);

        let flaky_key = format!("GET {flaky}");
        let comparison = &outcome.endpoints[&flaky_key];
        assert!(comparison.degradation);
        assert_eq!(comparison.changes.error_rate_increase, 0.);
        assert_eq!(comparison.changes.success_rate_decrease, 50.);
        assert!(outcome
            .degraded_endpoints()
            .any(|(key, _)| key == &flaky_key));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn connection_errors_are_recorded() {
        init().await;
        let closed = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let tasks = vec![Task::new("GET", &format!("http://{closed}/"))];
        let runner = Runner::new(tasks, RunConfig::new(2, 3)).unwrap();

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.status_code, 0);
            assert!(matches!(result.error, Some(RequestError::Connect(_))));
        }

        let stats = Statistics::calculate(&results);
        let endpoint = stats.endpoint_stats.values().next().unwrap();
        assert_eq!(endpoint.failed_requests, 3);
        assert_eq!(endpoint.success_rate(), 0.);
        assert_eq!(endpoint.average_duration, Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn bodies_are_sent_only_when_enabled() {
        let addr = init().await;
        let task = Task::new("POST", &format!("http://{addr}/length")).body("payload");

        let without = Runner::new(vec![task.clone()], RunConfig::new(1, 2))
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(without.iter().all(|r| r.status_code == 411));

        let config = RunConfig {
            send_body: true,
            ..RunConfig::new(1, 2)
        };
        let with = Runner::new(vec![task], config).unwrap().run().await.unwrap();
        assert!(with.iter().all(|r| r.status_code == 200));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn invalid_method_is_an_invalid_request() {
        let addr = init().await;
        let tasks = vec![Task::new("NOT A METHOD", &format!("http://{addr}/status/200"))];
        let runner = Runner::new(tasks, RunConfig::new(1, 1)).unwrap();

        let results = runner.run().await.unwrap();
        assert!(matches!(
            results[0].error,
            Some(RequestError::InvalidRequest(_))
        ));
    }
}
