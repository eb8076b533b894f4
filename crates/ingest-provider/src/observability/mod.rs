//! Observability for the ingest provider.
//!
//! Metric labels are bounded to prevent cardinality explosion:
//! - `source_type`: bounded by the `SourceType` enum
//! - `field`: pts, dts
//! - `direction`: forward, reverse
//! - `kind`: wraparound, `source_restart`
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `provider_ingress_bytes_total` | Counter | `source_type` | Payload bytes dispatched to applications |
//! | `provider_ingress_packets_total` | Counter | `source_type` | Packets dispatched to applications |
//! | `provider_timestamp_wraparound_total` | Counter | `field`, `direction` | Counter wraps seen by the rebase strategy |
//! | `provider_timestamp_delta_discontinuity_total` | Counter | `kind` | Backward steps seen by the delta strategy |

pub mod metrics;

// Re-exports for convenience
pub use metrics::{init_metrics_recorder, IngressMetrics, PrometheusIngressMetrics};
