use complyze_core::{Category, ClassificationResult, RiskCategory};

use crate::patterns::GROUPS;

/// Deterministic, single-threaded, regex-based classification. Identical
/// input bytes always produce an identical result — no randomness, no
/// clock reads on this path.
pub fn classify(text: &str) -> ClassificationResult {
    let mut categories = Vec::new();
    let mut details = Vec::new();
    let mut raw_score: u32 = 0;
    let mut phi_matched = false;
    let mut pii_match_count: usize = 0;

    for group in GROUPS.iter() {
        let matched = group.patterns.iter().filter(|pattern| pattern.is_match(text)).count();
        if matched == 0 {
            continue;
        }
        categories.push(group.category);
        raw_score += (matched as u32 * group.weight).min(20);
        details.push(format!("{} matched {matched} pattern(s)", group.category));

        if group.category == Category::Phi {
            phi_matched = true;
        }
        if group.category == Category::Pii {
            pii_match_count = matched;
        }
    }

    let sensitivity_score = if raw_score == 0 {
        0
    } else {
        ((raw_score as f64 / 40.0) * 100.0).round().min(100.0) as u8
    };

    let risk_category = if sensitivity_score >= 75 || phi_matched || pii_match_count > 1 {
        RiskCategory::Critical
    } else if sensitivity_score >= 50 {
        RiskCategory::High
    } else if sensitivity_score >= 25 {
        RiskCategory::Moderate
    } else {
        RiskCategory::Low
    };

    let policy_violation_flag = categories.iter().any(|c| {
        matches!(
            c,
            Category::Pii | Category::Financial | Category::Phi | Category::TradeSecret
        )
    });

    if categories.is_empty() {
        categories.push(Category::None);
    }

    ClassificationResult {
        categories_detected: categories,
        sensitivity_score,
        policy_violation_flag,
        risk_category,
        details,
    }
}

/// `⌈len(text)/4⌉`, the token-count approximation used on `ActivityEvent`.
pub fn estimate_tokens(text: &str) -> u64 {
    let len = text.len() as u64;
    len.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_none_and_low() {
        let r = classify("");
        assert_eq!(r.categories_detected, vec![Category::None]);
        assert_eq!(r.sensitivity_score, 0);
        assert_eq!(r.risk_category, RiskCategory::Low);
        assert!(!r.policy_violation_flag);
    }

    #[test]
    fn benign_prompt_classifies_as_none() {
        let r = classify("What is the capital of France?");
        assert_eq!(r.categories_detected, vec![Category::None]);
        assert_eq!(r.risk_category, RiskCategory::Low);
    }

    #[test]
    fn ssn_and_diagnosis_trigger_critical_via_phi() {
        let r = classify(
            "Patient SSN 123-45-6789, diagnosis ICD-10 J45.20, prescription metformin",
        );
        assert!(r.categories_detected.contains(&Category::Pii));
        assert!(r.categories_detected.contains(&Category::Phi));
        assert_eq!(r.risk_category, RiskCategory::Critical);
        assert!(r.policy_violation_flag);
    }

    #[test]
    fn two_pii_matches_force_critical_even_below_75() {
        let r = classify("Email me at jane@example.com or call 415-555-0100");
        assert!(r.categories_detected.contains(&Category::Pii));
        assert_eq!(r.risk_category, RiskCategory::Critical);
    }

    #[test]
    fn classify_is_pure_and_deterministic() {
        let text = "confidential strategic plan, NDA required";
        let a = classify(text);
        let b = classify(text);
        assert_eq!(a.sensitivity_score, b.sensitivity_score);
        assert_eq!(a.categories_detected, b.categories_detected);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(""), 0);
    }
}
