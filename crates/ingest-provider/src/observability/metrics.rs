//! Metrics definitions for the ingest provider.
//!
//! All metrics follow Prometheus naming conventions:
//! - `provider_` prefix
//! - `_total` suffix for counters
//!
//! Ingress accounting goes through the [`IngressMetrics`] capability handed
//! to each stream, so streams can be driven without a global recorder.
//! Timestamp discontinuities are recorded straight through the `metrics`
//! facade and are no-ops until a recorder is installed.

use media_protocol::stream::StreamInfo;
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::timestamp::TimestampField;

/// Initialize Prometheus metrics recorder and return the handle
/// for rendering metrics.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Sink for per-stream ingress accounting.
///
/// Implementations must tolerate concurrent calls from many streams.
pub trait IngressMetrics: Send + Sync {
    /// Record one packet of `bytes` payload bytes received on `stream`.
    fn record_ingress(&self, stream: &StreamInfo, bytes: u64);
}

/// [`IngressMetrics`] backed by the process-wide `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusIngressMetrics;

impl IngressMetrics for PrometheusIngressMetrics {
    /// Metrics: `provider_ingress_bytes_total`, `provider_ingress_packets_total`
    /// Labels: `source_type`
    fn record_ingress(&self, stream: &StreamInfo, bytes: u64) {
        let source_type = stream.source_type.as_str();
        counter!("provider_ingress_bytes_total", "source_type" => source_type).increment(bytes);
        counter!("provider_ingress_packets_total", "source_type" => source_type).increment(1);
    }
}

/// Record a counter wrap detected by the rebase strategy.
///
/// Metric: `provider_timestamp_wraparound_total`
/// Labels: `field` (pts, dts), `direction` (forward, reverse)
pub fn record_wraparound(field: TimestampField, direction: &'static str) {
    counter!(
        "provider_timestamp_wraparound_total",
        "field" => field.as_str(),
        "direction" => direction
    )
    .increment(1);
}

/// Record a backward step seen by the delta strategy.
///
/// Metric: `provider_timestamp_delta_discontinuity_total`
/// Labels: `kind` (wraparound, `source_restart`)
pub fn record_delta_discontinuity(kind: &'static str) {
    counter!("provider_timestamp_delta_discontinuity_total", "kind" => kind).increment(1);
}
