//! Metrics collection.
//!
//! Prometheus-compatible metrics with typed convenience functions for
//! recording game measurements. The `metrics` macros are no-ops until a
//! recorder is installed, so every function here is safe to call from
//! tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::AxethrowError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `AxethrowError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), AxethrowError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| AxethrowError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("axethrow_sessions_total", "Sessions started");
    describe_counter!("axethrow_targets_hit_total", "Targets hit by projectiles");
    describe_counter!("axethrow_targets_spawned_total", "Targets placed in the world");
    describe_histogram!(
        "axethrow_feed_poll_duration_ms",
        "Duration of one entity feed polling cycle in milliseconds"
    );
    describe_gauge!(
        "axethrow_tracked_entities",
        "Entities present in the latest tracker snapshot"
    );
    describe_counter!(
        "axethrow_host_errors_total",
        "World or console calls that failed"
    );
}

/// Records a session start.
pub fn record_session_started() {
    counter!("axethrow_sessions_total").increment(1);
}

/// Records a target hit worth `points`.
pub fn record_target_hit(points: u32) {
    counter!("axethrow_targets_hit_total", "points" => points.to_string()).increment(1);
}

/// Records a placed wave of targets.
pub fn record_targets_spawned(count: usize) {
    counter!("axethrow_targets_spawned_total").increment(count as u64);
}

/// Records one feed polling cycle.
pub fn record_feed_poll(duration: Duration) {
    histogram!("axethrow_feed_poll_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Sets the tracked entity gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_entities(count: usize) {
    gauge!("axethrow_tracked_entities").set(count as f64);
}

/// Records a failed host call by operation name.
pub fn record_host_error(operation: &'static str) {
    counter!("axethrow_host_errors_total", "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_session_started();
        record_target_hit(3);
        record_targets_spawned(2);
        record_feed_poll(Duration::from_millis(42));
        set_tracked_entities(4);
        record_host_error("place_volumes");
    }
}
