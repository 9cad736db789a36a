//! Metrics module
//!
//! Provides Prometheus metrics for uploads, upload sessions and token
//! exchanges.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "sp_router_uploads_total",
        "Total number of uploads",
        &["protocol", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "sp_router_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "sp_router_upload_duration_seconds",
        "Upload duration in seconds",
        &["protocol"],
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Upload session metrics
    pub static ref SESSION_CHUNKS: Histogram = register_histogram!(
        "sp_router_session_chunks",
        "Number of chunks sent per upload session",
        vec![1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 500.0]
    ).unwrap();

    // Auth metrics
    pub static ref TOKEN_REQUESTS: CounterVec = register_counter_vec!(
        "sp_router_token_requests_total",
        "Token endpoint requests",
        &["status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "sp_router_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(protocol: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[protocol, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(protocol: &str) {
    UPLOADS_TOTAL.with_label_values(&[protocol, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(protocol: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[protocol])
        .observe(duration_secs);
}

/// Record the number of chunks a session needed
pub fn record_session_chunks(chunks: usize) {
    SESSION_CHUNKS.observe(chunks as f64);
}

/// Record a token endpoint request
pub fn record_token_request(success: bool) {
    let status = if success { "success" } else { "failure" };
    TOKEN_REQUESTS.with_label_values(&[status]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_upload_success() {
        record_upload_success("simple", 1024);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_record_session_chunks() {
        record_session_chunks(4);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_gather_contains_recorded_metric() {
        record_token_request(true);
        let text = gather();
        assert!(text.contains("sp_router_token_requests_total"));
    }
}
