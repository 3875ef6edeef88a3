use serde::{Deserialize, Serialize};

pub const ACTIVITY_EVENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pii,
    Financial,
    SourceCode,
    Phi,
    TradeSecret,
    InternalUrl,
    None,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pii => "pii",
            Self::Financial => "financial",
            Self::SourceCode => "source_code",
            Self::Phi => "phi",
            Self::TradeSecret => "trade_secret",
            Self::InternalUrl => "internal_url",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementAction {
    Monitor,
    Warn,
    Redact,
    Block,
}

/// Result of running the classifier over one body (or one attachment's
/// extracted text). `categories_detected` is `[None]` when nothing matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub categories_detected: Vec<Category>,
    pub sensitivity_score: u8,
    pub policy_violation_flag: bool,
    pub risk_category: RiskCategory,
    pub details: Vec<String>,
}

impl ClassificationResult {
    pub fn empty() -> Self {
        ClassificationResult {
            categories_detected: vec![Category::None],
            sensitivity_score: 0,
            policy_violation_flag: false,
            risk_category: RiskCategory::Low,
            details: Vec::new(),
        }
    }
}

/// Emitted to the control plane per inspected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: String,
    pub schema_version: u32,
    pub tool: String,
    pub tool_domain: String,
    pub user_hash: String,
    pub prompt_hash: String,
    pub prompt_length: usize,
    pub token_count_estimate: u64,
    pub api_endpoint: String,
    pub sensitivity_score: u8,
    pub sensitivity_categories: Vec<Category>,
    pub policy_violation_flag: bool,
    pub risk_category: RiskCategory,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement_action: Option<EnforcementAction>,
    pub attachment_inspection_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_matches_wire_form() {
        assert_eq!(Category::SourceCode.to_string(), "source_code");
        assert_eq!(Category::InternalUrl.to_string(), "internal_url");
    }

    #[test]
    fn empty_classification_is_none_and_low() {
        let r = ClassificationResult::empty();
        assert_eq!(r.categories_detected, vec![Category::None]);
        assert_eq!(r.risk_category, RiskCategory::Low);
        assert_eq!(r.sensitivity_score, 0);
        assert!(!r.policy_violation_flag);
    }

    #[test]
    fn risk_category_orders_low_to_critical() {
        assert!(RiskCategory::Critical > RiskCategory::High);
        assert!(RiskCategory::High > RiskCategory::Moderate);
        assert!(RiskCategory::Moderate > RiskCategory::Low);
    }
}
