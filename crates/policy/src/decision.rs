use complyze_core::{ClassificationResult, EnforcementAction, EnforcementMode, RiskCategory};

use crate::redact::redact;

/// What the connection handler must do with the request.
#[derive(Debug, Clone)]
pub enum PolicyAction {
    /// Forward `body` upstream unchanged or redacted.
    Forward { body: Vec<u8> },
    /// Sensitive under `warn` mode: do not forward; return `HTTP 299` with
    /// `json_body` and the `X-Complyze-*` headers.
    WarnResponse { json_body: Vec<u8> },
    /// Sensitive-and-critical under `block` mode: do not forward; return
    /// `HTTP 403` with `json_body`.
    BlockResponse { json_body: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub action: PolicyAction,
    pub enforcement_action: Option<EnforcementAction>,
    pub blocked: bool,
}

/// Resolves the enforcement action for one classified request body. The
/// canonical `enforcement_mode` (already resolved from `Settings` via
/// `effective_enforcement_mode`) drives which of the four branches applies.
pub fn resolve(
    mode: EnforcementMode,
    classification: &ClassificationResult,
    body: &[u8],
) -> PolicyOutcome {
    let sensitive = classification.policy_violation_flag;

    match mode {
        EnforcementMode::Monitor => PolicyOutcome {
            action: PolicyAction::Forward { body: body.to_vec() },
            enforcement_action: sensitive.then_some(EnforcementAction::Monitor),
            blocked: false,
        },
        EnforcementMode::Warn => {
            if !sensitive {
                PolicyOutcome {
                    action: PolicyAction::Forward { body: body.to_vec() },
                    enforcement_action: None,
                    blocked: false,
                }
            } else {
                PolicyOutcome {
                    action: PolicyAction::WarnResponse {
                        json_body: warn_body(classification),
                    },
                    enforcement_action: Some(EnforcementAction::Warn),
                    blocked: false,
                }
            }
        }
        EnforcementMode::Redact => {
            if !sensitive {
                PolicyOutcome {
                    action: PolicyAction::Forward { body: body.to_vec() },
                    enforcement_action: None,
                    blocked: false,
                }
            } else {
                let original = String::from_utf8_lossy(body);
                let redacted = redact(&original);
                PolicyOutcome {
                    action: PolicyAction::Forward { body: redacted.into_bytes() },
                    enforcement_action: Some(EnforcementAction::Redact),
                    blocked: false,
                }
            }
        }
        EnforcementMode::Block => {
            if sensitive && classification.risk_category == RiskCategory::Critical {
                PolicyOutcome {
                    action: PolicyAction::BlockResponse {
                        json_body: block_body(classification, mode),
                    },
                    enforcement_action: Some(EnforcementAction::Block),
                    blocked: true,
                }
            } else {
                PolicyOutcome {
                    action: PolicyAction::Forward { body: body.to_vec() },
                    enforcement_action: sensitive.then_some(EnforcementAction::Block),
                    blocked: false,
                }
            }
        }
    }
}

fn warn_body(classification: &ClassificationResult) -> Vec<u8> {
    serde_json::json!({
        "warning": true,
        "enforcement_mode": "warn",
        "override_allowed": true,
        "detection": {
            "categories": classification.categories_detected,
            "sensitivity_score": classification.sensitivity_score,
            "risk_category": classification.risk_category,
        }
    })
    .to_string()
    .into_bytes()
}

fn block_body(classification: &ClassificationResult, mode: EnforcementMode) -> Vec<u8> {
    serde_json::json!({
        "blocked": true,
        "reason": "sensitive content detected at critical risk",
        "enforcement_mode": mode.to_string(),
        "detection": {
            "categories": classification.categories_detected,
            "sensitivity_score": classification.sensitivity_score,
            "risk_category": classification.risk_category,
        }
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use complyze_classify::classify;

    #[test]
    fn monitor_forwards_unchanged_and_sets_action_only_if_sensitive() {
        let clean = classify("hello world");
        let outcome = resolve(EnforcementMode::Monitor, &clean, b"hello world");
        assert!(outcome.enforcement_action.is_none());
        assert!(!outcome.blocked);

        let sensitive = classify("confidential strategic plan");
        let outcome = resolve(EnforcementMode::Monitor, &sensitive, b"confidential strategic plan");
        assert_eq!(outcome.enforcement_action, Some(EnforcementAction::Monitor));
        assert!(!outcome.blocked);
    }

    #[test]
    fn block_mode_blocks_only_when_critical() {
        let critical = classify("Patient SSN 123-45-6789, diagnosis ICD-10 J45.20, prescription metformin");
        let outcome = resolve(EnforcementMode::Block, &critical, b"irrelevant");
        assert!(outcome.blocked);
        assert!(matches!(outcome.action, PolicyAction::BlockResponse { .. }));
    }

    #[test]
    fn block_mode_forwards_non_critical_sensitive_content() {
        let moderate = classify("this code has a function foo() in it");
        assert_ne!(moderate.risk_category, RiskCategory::Critical);
        let outcome = resolve(EnforcementMode::Block, &moderate, b"body");
        assert!(!outcome.blocked);
        assert!(matches!(outcome.action, PolicyAction::Forward { .. }));
    }

    #[test]
    fn redact_mode_rewrites_body_when_sensitive() {
        let classification = classify("SSN 123-45-6789 attached");
        let outcome = resolve(EnforcementMode::Redact, &classification, b"SSN 123-45-6789 attached");
        match outcome.action {
            PolicyAction::Forward { body } => {
                let text = String::from_utf8(body).unwrap();
                assert!(text.contains("[REDACTED_SSN]"));
            }
            _ => panic!("expected forward with redacted body"),
        }
        assert_eq!(outcome.enforcement_action, Some(EnforcementAction::Redact));
    }

    #[test]
    fn warn_mode_withholds_forward_when_sensitive() {
        let classification = classify("confidential merger details, NDA in place");
        let outcome = resolve(EnforcementMode::Warn, &classification, b"body");
        assert!(matches!(outcome.action, PolicyAction::WarnResponse { .. }));
        assert_eq!(outcome.enforcement_action, Some(EnforcementAction::Warn));
    }
}
