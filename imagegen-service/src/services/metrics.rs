//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the /metrics endpoint handler.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Call once at startup before any metrics are recorded; later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    // Lost race: the winner's handle serves /metrics.
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Record one upstream model call and how it ended.
pub fn record_model_attempt(model: &str, outcome: &'static str, duration_secs: f64) {
    counter!(
        "imagegen_model_attempts_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("imagegen_model_latency_seconds", "model" => model.to_string())
        .record(duration_secs);
}

/// Record a finished generation attempt (the whole fallback loop).
pub fn record_generation(outcome: &'static str) {
    counter!("imagegen_generations_total", "outcome" => outcome).increment(1);
}
