use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=info")),
        )
        .init();

    tokio::spawn(mock_service::tps_measure_task());

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("Mock service listening on {}", listener.local_addr().unwrap());
    mock_service::run(listener).await;
}
