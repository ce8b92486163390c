use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("write_proxy_requests_total", "Total number of write requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("write_proxy_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref REJECTED_TOTAL: Counter =
        register_counter!("write_proxy_rejected_total", "Requests rejected by validation").unwrap();
    pub static ref STORE_FAILURES: Counter =
        register_counter!("write_proxy_store_failures_total", "Failed content store mutations").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "write_proxy_request_latency_seconds",
        "Write request latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("write_proxy_tracked_clients", "Clients with an open rate limit window").unwrap();
}

// Renders the default registry in Prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics are not utf-8: {e}"))
}
