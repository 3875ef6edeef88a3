use chrono::{DateTime, Utc};
use complyze_core::{ClassificationResult, EnforcementAction, EnforcementMode};
use serde::{Deserialize, Serialize};

/// Min/avg/max/count summary for one latency bucket (`text` or
/// `attachment`), reported in each `metrics_snapshot` line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InspectionLatencyBucket {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl InspectionLatencyBucket {
    pub fn observe(&mut self, sample_ms: f64) {
        if self.count == 0 {
            self.min_ms = sample_ms;
            self.max_ms = sample_ms;
        } else {
            self.min_ms = self.min_ms.min(sample_ms);
            self.max_ms = self.max_ms.max(sample_ms);
        }
        let total = self.avg_ms * self.count as f64 + sample_ms;
        self.count += 1;
        self.avg_ms = total / self.count as f64;
    }
}

/// One JSON line in the rolling telemetry log. Tagged by `event` so a reader
/// can `grep`/`jq` by record kind without parsing the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryRecord {
    ProxyStart {
        timestamp: DateTime<Utc>,
        os: String,
        hostname: String,
        proxy_port: u16,
        monitor_mode: bool,
        fail_open: bool,
    },
    EnforcementDecision {
        timestamp: DateTime<Utc>,
        hostname: String,
        path: String,
        detection_result: ClassificationResult,
        reu_score: f64,
        enforcement_mode: EnforcementMode,
        enforcement_action: EnforcementAction,
    },
    InspectionError {
        timestamp: DateTime<Utc>,
        request_id: String,
        hostname: String,
        file_size: u64,
        error_message: String,
        inspection_ms: u64,
        fail_open: bool,
        action: String,
    },
    SizeLimit {
        timestamp: DateTime<Utc>,
        kind: SizeLimitKind,
        hostname: String,
        declared_bytes: u64,
        limit_bytes: u64,
    },
    MetricsSnapshot {
        timestamp: DateTime<Utc>,
        cpu_percent: f64,
        rss_mb: f64,
        text_latency: InspectionLatencyBucket,
        attachment_latency: InspectionLatencyBucket,
    },
    MemoryLimit {
        timestamp: DateTime<Utc>,
        heap_mb: f64,
        threshold_mb: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeLimitKind {
    BodyTooLarge,
    AttachmentSizeLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_bucket_tracks_min_max_avg() {
        let mut bucket = InspectionLatencyBucket::default();
        bucket.observe(10.0);
        bucket.observe(30.0);
        bucket.observe(20.0);
        assert_eq!(bucket.count, 3);
        assert_eq!(bucket.min_ms, 10.0);
        assert_eq!(bucket.max_ms, 30.0);
        assert_eq!(bucket.avg_ms, 20.0);
    }

    #[test]
    fn record_serializes_with_event_tag() {
        let record = TelemetryRecord::MemoryLimit {
            timestamp: Utc::now(),
            heap_mb: 600.0,
            threshold_mb: 512.0,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"event\":\"memory_limit\""));
    }
}
