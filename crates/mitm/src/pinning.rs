use dashmap::DashMap;

use complyze_core::{PinningMode, PinningRecord};

use crate::error::MitmError;

/// Error-message fragments consistent with client-side certificate pinning
/// rejecting a minted leaf. Matched case-insensitively against whatever the
/// TLS handshake error renders as.
const PINNING_SIGNATURES: &[&str] = &[
    "unknown ca",
    "bad certificate",
    "alert certificate unknown",
    "handshake failure",
    "tlsv1 alert",
    "connection reset",
];

/// True if `message` looks like the client rejected our minted certificate
/// rather than some unrelated network failure.
pub fn is_pinning_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    PINNING_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Like [`is_pinning_failure`] but inspects the original error first: a
/// pinning client that doesn't trust our CA often just resets the TCP
/// connection mid-handshake instead of sending a TLS alert, which
/// `io::Error`'s `Display` renders as `"io error: ..."` with no signature
/// substring for string matching to catch.
pub fn is_pinning_failure_err(err: &MitmError) -> bool {
    if let MitmError::Io(io_err) = err {
        if io_err.kind() == std::io::ErrorKind::ConnectionReset {
            return true;
        }
    }
    is_pinning_failure(&err.to_string())
}

/// Concurrent per-host pinning state. Read on every CONNECT to decide
/// routing, written once a terminator handshake fails with a pinning
/// signature.
#[derive(Default)]
pub struct PinningStore {
    records: DashMap<String, PinningRecord>,
}

impl PinningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `metadata-only` hosts skip deep inspection unless `strict_pin_mode`
    /// is set, in which case the record is kept but ignored for routing.
    pub fn is_metadata_only(&self, host: &str, strict_pin_mode: bool) -> bool {
        if strict_pin_mode {
            return false;
        }
        self.records
            .get(host)
            .is_some_and(|r| r.mode == PinningMode::MetadataOnly)
    }

    pub fn record_failure(&self, host: &str, reason: &str, at: chrono::DateTime<chrono::Utc>) {
        self.records
            .entry(host.to_string())
            .and_modify(|r| r.record_again(reason, at))
            .or_insert_with(|| PinningRecord::new_detection(reason, at));
    }

    pub fn get(&self, host: &str) -> Option<PinningRecord> {
        self.records.get(host).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn recognizes_pinning_signatures() {
        assert!(is_pinning_failure("TLS error: unknown CA alert"));
        assert!(is_pinning_failure("handshake failure during accept"));
        assert!(!is_pinning_failure("connection timed out"));
    }

    #[test]
    fn treats_connection_reset_during_handshake_as_pinning() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = MitmError::Io(io_err);
        assert!(is_pinning_failure_err(&err));
        // The stringified form carries no recognizable substring on its own.
        assert!(!is_pinning_failure(&err.to_string()));
    }

    #[test]
    fn unrelated_io_errors_are_not_pinning() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = MitmError::Io(io_err);
        assert!(!is_pinning_failure_err(&err));
    }

    #[test]
    fn promotes_host_to_metadata_only_after_failure() {
        let store = PinningStore::new();
        assert!(!store.is_metadata_only("chatgpt.com", false));
        store.record_failure("chatgpt.com", "unknown ca", Utc::now());
        assert!(store.is_metadata_only("chatgpt.com", false));
        assert!(!store.is_metadata_only("chatgpt.com", true));
    }

    #[test]
    fn repeated_failures_increment_detection_count() {
        let store = PinningStore::new();
        store.record_failure("chatgpt.com", "unknown ca", Utc::now());
        store.record_failure("chatgpt.com", "bad certificate", Utc::now());
        assert_eq!(store.get("chatgpt.com").unwrap().detections, 2);
    }
}
