use axum::{body::Bytes, debug_handler, extract::Path, http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

pub fn router() -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay).post(delay))
        .route("/status/:code", get(status))
        .route("/alternate/:name/delay/ms/:delay_ms", get(alternate))
        .route("/length", get(length).post(length).put(length))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) {
    if let Err(err) = axum::serve(listener, router()).await {
        error!("Mock service stopped: {err}");
    }
}

/// Serve on an ephemeral localhost port in the background.
pub async fn spawn() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(listener));
    addr
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
pub async fn status(Path(code): Path<u16>) -> StatusCode {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

lazy_static! {
    static ref ALTERNATE_MAP: Arc<RwLock<HashMap<String, Arc<AtomicU64>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Every second request to the same `name` is delayed by `delay_ms`, the rest answer at once.
#[debug_handler]
pub async fn alternate(Path((name, delay_ms)): Path<(String, u64)>) {
    REQUESTS.fetch_add(1, Ordering::Relaxed);

    let read = ALTERNATE_MAP.read().unwrap().get(&name).cloned();
    let counter = if let Some(counter) = read {
        counter
    } else {
        ALTERNATE_MAP
            .write()
            .unwrap()
            .entry(name)
            .or_default()
            .clone()
    };

    if counter.fetch_add(1, Ordering::Relaxed) % 2 == 1 {
        debug!("Delaying alternate request by {delay_ms}ms");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// Responds with the length of the request body, or `411` without one.
#[debug_handler]
pub async fn length(body: Bytes) -> Result<String, StatusCode> {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    if body.is_empty() {
        return Err(StatusCode::LENGTH_REQUIRED);
    }
    Ok(body.len().to_string())
}

/** Request counter **/

static REQUESTS: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = REQUESTS.swap(0, Ordering::Relaxed);
        debug!("{requests} TPS");
    }
}
