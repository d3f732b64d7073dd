//! Metric helpers for `netcondition`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};

/// Counter of intercepted requests, labelled by outcome.
pub const REQUESTS_TOTAL: &str = "netcondition_requests_total";
/// Histogram of injected delays in seconds.
pub const INJECTED_DELAY_SECONDS: &str = "netcondition_injected_delay_seconds";
/// Gauge tracking the number of registry entries.
pub const REGISTRY_ENTRIES: &str = "netcondition_registry_entries";
/// Counter of telemetry measurements that never reached the sink.
pub const TELEMETRY_DROPPED: &str = "netcondition_telemetry_dropped_total";
/// Counter of custom handlers that panicked.
pub const HANDLER_PANICS: &str = "netcondition_handler_panics_total";

/// Reason a telemetry measurement was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The emitter queue was full.
    QueueFull,
    /// The emitter worker has stopped.
    Closed,
    /// The sink rejected or failed to write the measurement.
    SinkError,
}

impl DropReason {
    /// Label value used for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DropReason::QueueFull => "queue_full",
            DropReason::Closed => "closed",
            DropReason::SinkError => "sink_error",
        }
    }
}

/// Record an intercepted request with the given outcome label.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn inc_requests(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an injected delay.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn observe_delay(delay: std::time::Duration) {
    #[cfg(feature = "metrics")]
    histogram!(INJECTED_DELAY_SECONDS).record(delay.as_secs_f64());
}

/// Set the registry size gauge.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn set_registry_entries(len: usize) {
    #[cfg(feature = "metrics")]
    {
        #[expect(clippy::cast_precision_loss, reason = "registry sizes are small")]
        gauge!(REGISTRY_ENTRIES).set(len as f64);
    }
}

/// Record a dropped telemetry measurement.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn inc_telemetry_dropped(reason: DropReason) {
    #[cfg(feature = "metrics")]
    counter!(TELEMETRY_DROPPED, "reason" => reason.as_str()).increment(1);
}

/// Record a panicking custom handler.
pub fn inc_handler_panics() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_PANICS).increment(1);
}

/// Install a global Prometheus recorder and return a handle for rendering it.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
#[cfg(feature = "metrics")]
pub fn install_prometheus_recorder()
-> Result<metrics_exporter_prometheus::PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()
}
