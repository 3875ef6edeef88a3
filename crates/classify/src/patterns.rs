use complyze_core::Category;
use once_cell::sync::Lazy;
use regex::Regex;

pub struct PatternGroup {
    pub category: Category,
    pub weight: u32,
    pub patterns: Vec<Regex>,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("pattern group regex is a compile-time constant")
}

pub static GROUPS: Lazy<Vec<PatternGroup>> = Lazy::new(|| {
    vec![
        PatternGroup {
            category: Category::Pii,
            weight: 4,
            patterns: vec![
                re(r"\b\d{3}[-.\s]?\d{2}[-.\s]?\d{4}\b"),
                re(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
                re(r"(\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
                re(r"\b[A-Z][a-z]+\s[A-Z][a-z]+\b"),
                re(r"(?i)\b\d+\s+\w+\s+(street|st|avenue|ave|boulevard|blvd|road|rd|lane|ln|drive|dr)\b"),
                re(r"(?i)\b(date of birth|dob)\b"),
            ],
        },
        PatternGroup {
            category: Category::Financial,
            weight: 4,
            patterns: vec![
                re(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b"),
                re(r"(?i)\b(routing|account)\s*(number|#)?\s*[:#]?\s*\d{6,17}\b"),
                re(r"\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b"),
                re(r"\b[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?\b"),
                re(r"\$\s?\d[\d,]*(\.\d{2})?"),
                re(r"(?i)\b(earnings|revenue|profit margin|quarterly results)\b"),
            ],
        },
        PatternGroup {
            category: Category::SourceCode,
            weight: 2,
            patterns: vec![
                re(r"\bfunction\s+\w+"),
                re(r#"\bimport\s+.+\s+from\s+['"]"#),
                re(r"(?i)\b(select|insert|update|delete)\b.+\bfrom\b"),
                re(r"=>\s*\{"),
                re(r"(^|\s)(//|#|/\*)"),
            ],
        },
        PatternGroup {
            category: Category::Phi,
            weight: 5,
            patterns: vec![
                re(r"(?i)\bdiagnosis\b"),
                re(r"(?i)\bprescription\b"),
                re(r"\b[A-TV-Z][0-9]{2}(?:\.[0-9]{1,4})?\b"),
                re(r"(?i)\b(blood pressure|heart rate|bpm|systolic|diastolic)\b"),
                re(r"(?i)\b(mri|ct scan|x-ray|ultrasound)\b"),
                re(r"(?i)\bhipaa\b"),
            ],
        },
        PatternGroup {
            category: Category::TradeSecret,
            weight: 5,
            patterns: vec![
                re(r"(?i)\bconfidential\b"),
                re(r"\bNDA\b"),
                re(r"(?i)\bpatent pending\b"),
                re(r"(?i)\bstrategic plan\b"),
                re(r"(?i)\bproprietary\b"),
            ],
        },
        PatternGroup {
            category: Category::InternalUrl,
            weight: 3,
            patterns: vec![
                re(r"\b10\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"),
                re(r"\b172\.(1[6-9]|2\d|3[01])\.\d{1,3}\.\d{1,3}\b"),
                re(r"\b192\.168\.\d{1,3}\.\d{1,3}\b"),
                re(r"\blocalhost\b"),
                re(r"(?i)\b[\w-]+\.(internal|corp|local|lan)\b"),
            ],
        },
    ]
});
