use std::collections::HashMap;

use complyze_core::{ClassificationResult, EnforcementAction, RiskCategory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub device_id: String,
    pub hostname: String,
    pub os: String,
    pub version: String,
    pub status: &'static str,
    pub workspace_id: String,
    pub service_connectivity: bool,
    pub traffic_routing: bool,
    pub os_integration: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub acknowledged: bool,
}

/// Fire-and-forget per-request event, `ActivityEvent` plus the classifier
/// record, posted with auth headers/cookies already stripped by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct InterceptEventRequest {
    pub target_url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub user_id: String,
    pub log_only: bool,
    pub dlp: ClassificationResult,
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement_action: Option<EnforcementAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    pub risk_category: RiskCategory,
}
