use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

/// Install logging once per test binary and start a mock service for the calling test.
///
/// Each `#[tokio::test]` owns its runtime, so the service lives exactly as long as the test.
#[allow(unused)]
pub async fn init() -> SocketAddr {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        FmtSubscriber::builder()
            .with_env_filter("perfgate=debug,mock_service=debug")
            .with_test_writer()
            .init();
    });

    let addr = mock_service::spawn().await;
    debug!("Mock service listening on {addr}");
    addr
}
