//! Request metrics
//!
//! Emitted through the `metrics` facade; the embedding binary decides
//! whether a recorder is installed.
//!
//! - `asc_requests_total` (counter): labels `method`, `status`
//! - `asc_request_duration_seconds` (histogram): label `method`
//! - `asc_request_errors_total` (counter): label `kind`

/// Record a request that got an HTTP response.
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    ::metrics::counter!(
        "asc_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("asc_request_duration_seconds", "method" => method.to_string())
        .record(duration_secs);
}

/// Record a failed request with its error kind.
pub fn record_error(kind: &'static str) {
    ::metrics::counter!("asc_request_errors_total", "kind" => kind).increment(1);
}
