use once_cell::sync::Lazy;
use regex::Regex;

static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}[-.\s]?\d{2}[-.\s]?\d{4}\b").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static CREDIT_CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").unwrap());
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap());
static RFC1918_IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(10\.\d{1,3}\.\d{1,3}\.\d{1,3}|172\.(1[6-9]|2\d|3[01])\.\d{1,3}\.\d{1,3}|192\.168\.\d{1,3}\.\d{1,3})\b",
    )
    .unwrap()
});

/// Rewrites email/SSN/credit-card/phone/RFC1918-IPv4 occurrences with
/// `[REDACTED_*]` tokens. SSN and phone patterns overlap (a 9-digit run
/// matches both), so SSN runs first and phone only sees what's left.
pub fn redact(text: &str) -> String {
    let text = SSN.replace_all(text, "[REDACTED_SSN]");
    let text = EMAIL.replace_all(&text, "[REDACTED_EMAIL]");
    let text = CREDIT_CARD.replace_all(&text, "[REDACTED_CC]");
    let text = PHONE.replace_all(&text, "[REDACTED_PHONE]");
    let text = RFC1918_IPV4.replace_all(&text, "[REDACTED_IP]");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_ssn_and_leaves_rest_intact() {
        let out = redact("Patient SSN 123-45-6789 on file");
        assert!(out.contains("[REDACTED_SSN]"));
        assert!(!out.contains("123-45-6789"));
        assert!(out.contains("Patient"));
    }

    #[test]
    fn unchanged_text_has_no_redaction_targets() {
        let text = "nothing sensitive in here";
        assert_eq!(redact(text), text);
    }

    #[test]
    fn redacts_email() {
        let out = redact("contact jane.doe@example.com for access");
        assert!(out.contains("[REDACTED_EMAIL]"));
        assert!(!out.contains("jane.doe@example.com"));
    }

    #[test]
    fn redacts_internal_ip() {
        let out = redact("internal host at 10.0.1.5 is down");
        assert!(out.contains("[REDACTED_IP]"));
    }
}
