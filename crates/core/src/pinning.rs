use serde::{Deserialize, Serialize};

/// Whether a host is currently eligible for deep TLS interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinningMode {
    DeepInspect,
    MetadataOnly,
}

/// Per-hostname record tracking whether a TLS handshake with a minted leaf
/// certificate has ever failed in a way consistent with client-side
/// certificate pinning. The router consults this on every CONNECT; the
/// terminator writes it on handshake failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinningRecord {
    pub mode: PinningMode,
    pub detections: u32,
    pub reason: String,
    pub last_detected_at: chrono::DateTime<chrono::Utc>,
}

impl PinningRecord {
    pub fn new_detection(reason: impl Into<String>, at: chrono::DateTime<chrono::Utc>) -> Self {
        PinningRecord {
            mode: PinningMode::MetadataOnly,
            detections: 1,
            reason: reason.into(),
            last_detected_at: at,
        }
    }

    pub fn record_again(&mut self, reason: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        self.detections += 1;
        self.reason = reason.into();
        self.last_detected_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn new_detection_starts_metadata_only() {
        let r = PinningRecord::new_detection("unknown ca", Utc::now());
        assert_eq!(r.mode, PinningMode::MetadataOnly);
        assert_eq!(r.detections, 1);
    }

    #[test]
    fn record_again_increments_count() {
        let mut r = PinningRecord::new_detection("unknown ca", Utc::now());
        r.record_again("bad certificate", Utc::now());
        assert_eq!(r.detections, 2);
        assert_eq!(r.reason, "bad certificate");
    }
}
