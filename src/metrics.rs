//! Request metrics
//!
//! Counters are emitted through the `metrics` facade on every attempt. They
//! are no-ops until [`init_metrics`] installs the Prometheus exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Failure to install the exporter
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus exporter on {addr}: {message}")]
pub struct MetricsError {
    addr: SocketAddr,
    message: String,
}

/// Install the Prometheus exporter and describe the counters
///
/// Idempotent: later calls return `Ok(())` without rebinding.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(bound) = METRICS_INITIALIZED.get() {
        debug!(%bound, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError {
            addr,
            message: e.to_string(),
        })?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "HTTP requests sent to the Feedly API"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Attempts retried after a transient failure"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Responses with status 429"
    );
    describe_counter!(
        "token_refresh_total",
        Unit::Count,
        "Access token refresh attempts"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Whether the exporter is installed
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Timing and outcome of one attempt
#[derive(Debug)]
pub struct RequestMetrics {
    endpoint: String,
    attempt: u32,
    start: Instant,
}

impl RequestMetrics {
    /// Start timing an attempt against `endpoint` (path without query)
    pub fn start(endpoint: &str, attempt: u32) -> Self {
        let endpoint = endpoint.split('?').next().unwrap_or(endpoint).to_string();
        Self {
            endpoint,
            attempt,
            start: Instant::now(),
        }
    }

    /// Record a received response
    pub fn record_status(&self, status: u16) {
        self.record(status.to_string());
        if status == 429 {
            counter!("http_429_errors_total", "endpoint" => self.endpoint.clone()).increment(1);
        }
    }

    /// Record a failure with no response
    pub fn record_transport_error(&self) {
        self.record("network_error".to_string());
    }

    fn record(&self, status: String) {
        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status,
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds", "endpoint" => self.endpoint.clone())
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Record a retry about to sleep for `backoff`
pub fn record_retry(attempt: u32, backoff: Duration) {
    counter!("http_retries_total", "attempt" => attempt.to_string()).increment(1);
    debug!(attempt, backoff_ms = backoff.as_millis() as u64, "Retry backoff");
}

/// Record a token refresh attempt
pub fn record_token_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("token_refresh_total", "outcome" => outcome).increment(1);
}
