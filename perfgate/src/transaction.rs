use perfgate_core::RequestResult;

/// Emit the per-request trace event and, with the `metrics` feature, the request counters and
/// latency histogram.
pub(crate) fn record(result: &RequestResult) {
    tracing::trace!(
        worker = result.worker_id,
        method = %result.method,
        url = %result.url,
        status = result.status_code,
        latency = ?result.duration,
        "Request completed"
    );

    #[cfg(feature = "metrics")]
    {
        let endpoint = result.key();
        metrics::histogram!("perfgate_request_latency", "endpoint" => endpoint.clone())
            .record(result.duration.as_nanos() as f64);

        if result.is_success() {
            metrics::counter!("perfgate_request_success", "endpoint" => endpoint).increment(1);
        } else {
            metrics::counter!("perfgate_request_error", "endpoint" => endpoint).increment(1);
        }
    }
}
