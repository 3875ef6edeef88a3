use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tracing::warn;

use crate::records::{InspectionLatencyBucket, TelemetryRecord};
use crate::sink::TelemetrySink;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_MEMORY_THRESHOLD_MB: f64 = 512.0;

#[derive(Default)]
struct Buckets {
    text: InspectionLatencyBucket,
    attachment: InspectionLatencyBucket,
}

/// Accumulates inspection-latency samples between `metrics_snapshot` ticks
/// and reports process CPU/RSS alongside them, once per 30 s, plus a
/// `memory_limit` warning whenever heap use crosses the configured
/// threshold.
pub struct ResourceMonitor {
    buckets: Mutex<Buckets>,
    pid: Pid,
    memory_threshold_mb: f64,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self::with_memory_threshold(DEFAULT_MEMORY_THRESHOLD_MB)
    }

    pub fn with_memory_threshold(memory_threshold_mb: f64) -> Self {
        Self {
            buckets: Mutex::new(Buckets::default()),
            pid: Pid::from_u32(std::process::id()),
            memory_threshold_mb,
        }
    }

    pub fn observe_text_latency(&self, sample_ms: f64) {
        self.buckets.lock().text.observe(sample_ms);
    }

    pub fn observe_attachment_latency(&self, sample_ms: f64) {
        self.buckets.lock().attachment.observe(sample_ms);
    }

    /// Runs forever, emitting one `MetricsSnapshot` (and, if crossed, one
    /// `MemoryLimit`) per tick. Intended to be spawned once at startup.
    pub async fn run(self: Arc<Self>, sink: Arc<TelemetrySink>) {
        let mut system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
        );
        let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
        loop {
            ticker.tick().await;
            system.refresh_process(self.pid);
            let (cpu_percent, rss_mb) = match system.process(self.pid) {
                Some(process) => (process.cpu_usage() as f64, process.memory() as f64 / 1024.0),
                None => (0.0, 0.0),
            };

            let (text, attachment) = {
                let mut buckets = self.buckets.lock();
                let text = buckets.text;
                let attachment = buckets.attachment;
                buckets.text = InspectionLatencyBucket::default();
                buckets.attachment = InspectionLatencyBucket::default();
                (text, attachment)
            };

            if let Err(err) = sink.record(&TelemetryRecord::MetricsSnapshot {
                timestamp: chrono::Utc::now(),
                cpu_percent,
                rss_mb,
                text_latency: text,
                attachment_latency: attachment,
            }) {
                warn!(%err, "failed to record metrics snapshot");
            }

            if rss_mb > self.memory_threshold_mb {
                warn!(rss_mb, threshold_mb = self.memory_threshold_mb, "heap over threshold");
                sink.record(&TelemetryRecord::MemoryLimit {
                    timestamp: chrono::Utc::now(),
                    heap_mb: rss_mb,
                    threshold_mb: self.memory_threshold_mb,
                })
                .ok();
            }
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
