//! Structured logging/tracing init plus the rolling JSONL telemetry sink the
//! proxy writes every significant decision to.

mod monitor;
mod records;
mod sink;
mod tracing_init;

pub use monitor::ResourceMonitor;
pub use records::{InspectionLatencyBucket, SizeLimitKind, TelemetryRecord};
pub use sink::{SinkError, TelemetrySink};
pub use tracing_init::{init, LogFormat, MetricsExporter, TracingConfig, TracingGuard};
