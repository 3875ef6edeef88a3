//! Best-effort client for the loopback control plane: settings pull,
//! heartbeat, and per-request event posting.

mod client;
mod error;
mod models;
mod poller;

pub use client::ControlPlaneClient;
pub use error::ControlError;
pub use models::{HeartbeatRequest, HeartbeatResponse, InterceptEventRequest};
pub use poller::{run_heartbeat, run_settings_poller};

#[cfg(test)]
mod tests {
    use super::*;
    use complyze_core::{Category, ClassificationResult, RiskCategory};
    use std::collections::HashMap;

    #[test]
    fn intercept_event_request_serializes_without_optional_fields() {
        let event = InterceptEventRequest {
            target_url: "https://api.openai.com/v1/chat".into(),
            method: "POST".into(),
            headers: HashMap::new(),
            body: "hi".into(),
            user_id: "h_abc".into(),
            log_only: false,
            dlp: ClassificationResult {
                categories_detected: vec![Category::None],
                sensitivity_score: 0,
                policy_violation_flag: false,
                risk_category: RiskCategory::Low,
                details: vec![],
            },
            workspace_id: "default".into(),
            enforcement_action: None,
            blocked: None,
            risk_category: RiskCategory::Low,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("enforcement_action"));
        assert!(!json.contains("\"blocked\""));
    }
}
