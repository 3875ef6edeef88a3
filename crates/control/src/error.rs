use thiserror::Error;

/// All control-plane failures are swallowed by callers per the "best-effort,
/// never blocks forwarding" contract; this type exists so they can still log
/// something useful before doing so.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} from {endpoint}")]
    Status { endpoint: &'static str, status: u16 },
}
