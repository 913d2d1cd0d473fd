//! PHI scrubbing and light content checks for clinical text.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Patterns replaced before clinical text reaches a log line.
static PHI_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"), "[SSN]"),
        (Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").expect("valid regex"), "[PHONE]"),
        (
            Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("valid regex"),
            "[EMAIL]",
        ),
        (Regex::new(r"(?i)\bMRN\s*\d{6,10}\b").expect("valid regex"), "[MRN]"),
        // Bare record numbers directly followed by a record label
        (
            Regex::new(r"(?i)\b\d{8,12}\b(\s*(?:MRN|Patient|Record))").expect("valid regex"),
            "[MRN]$1",
        ),
    ]
});

/// Words whose presence marks text as clinical.
const MEDICAL_INDICATORS: &[&str] = &[
    "patient",
    "diagnosis",
    "treatment",
    "medication",
    "symptoms",
    "clinical",
    "medical",
    "health",
    "disease",
    "condition",
    "therapy",
    "prescription",
    "dosage",
    "adverse",
];

const MIN_WORDS: usize = 10;
const MAX_WORDS: usize = 10_000;

/// Replace SSNs, phone numbers, emails and record numbers with placeholders.
///
/// Returns the input unchanged when `enabled` is false.
pub fn sanitize_medical_text(text: &str, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }

    PHI_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

/// Coarse kind of submitted content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Tabular,
    Document,
    Text,
}

/// Outcome of [`validate_medical_content`]. Warnings never block a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentReport {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub content_type: ContentType,
    pub word_count: usize,
    pub has_medical_terms: bool,
}

/// Inspect submitted text and collect advisory warnings.
pub fn validate_medical_content(text: &str) -> ContentReport {
    let word_count = text.split_whitespace().count();
    let lower = text.to_lowercase();
    let mut warnings = Vec::new();

    if word_count < MIN_WORDS {
        warnings.push(
            "Very short content - may not provide sufficient context for analysis".to_string(),
        );
    }
    if word_count > MAX_WORDS {
        warnings.push("Very long content - analysis may be truncated".to_string());
    }

    let has_medical_terms = MEDICAL_INDICATORS.iter().any(|term| lower.contains(term));
    if !has_medical_terms {
        warnings.push("Content may not contain medical information".to_string());
    }

    let content_type = if [".csv", "dataframe", "table"].iter().any(|m| lower.contains(m)) {
        ContentType::Tabular
    } else if [".pdf", ".docx", ".txt"].iter().any(|m| lower.contains(m)) {
        ContentType::Document
    } else {
        ContentType::Text
    };

    ContentReport {
        is_valid: true,
        warnings,
        content_type,
        word_count,
        has_medical_terms,
    }
}

/// Stable, non-reversible identifier for a caller.
pub fn hash_user_identifier(user_id: &str) -> String {
    let digest = Sha256::digest(format!("vecta_user_{user_id}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_replaces_phi() {
        let text = "SSN 123-45-6789, call 555-123-4567 or mail jane.doe@example.com. MRN 12345678.";
        let clean = sanitize_medical_text(text, true);
        assert_eq!(clean, "SSN [SSN], call [PHONE] or mail [EMAIL]. [MRN].");
    }

    #[test]
    fn test_sanitize_bare_record_number() {
        let clean = sanitize_medical_text("ID 0012345678 Patient seen today", true);
        assert_eq!(clean, "ID [MRN] Patient seen today");
    }

    #[test]
    fn test_sanitize_disabled() {
        let text = "SSN 123-45-6789";
        assert_eq!(sanitize_medical_text(text, false), text);
    }

    #[test]
    fn test_sanitize_case_insensitive_mrn() {
        assert_eq!(sanitize_medical_text("mrn 1234567", true), "[MRN]");
    }

    #[test]
    fn test_validate_short_content() {
        let report = validate_medical_content("hello world");
        assert_eq!(report.word_count, 2);
        assert_eq!(report.warnings.len(), 2);
        assert!(!report.has_medical_terms);
        assert_eq!(report.content_type, ContentType::Text);
        assert!(report.is_valid);
    }

    #[test]
    fn test_validate_content_type() {
        let report = validate_medical_content("Attached table of patient lab values");
        assert_eq!(report.content_type, ContentType::Tabular);
        assert!(report.has_medical_terms);

        let report = validate_medical_content("See notes.pdf for history");
        assert_eq!(report.content_type, ContentType::Document);
    }

    #[test]
    fn test_hash_user_identifier() {
        let a = hash_user_identifier("alice");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, hash_user_identifier("alice"));
        assert_ne!(a, hash_user_identifier("bob"));
    }

    proptest! {
        #[test]
        fn sanitized_text_has_no_ssn(prefix in "[a-z ]{0,20}", a in 100u32..999, b in 10u32..99, c in 1000u32..9999) {
            let text = format!("{prefix} {a}-{b}-{c} end");
            let clean = sanitize_medical_text(&text, true);
            let ssn = format!("{a}-{b}-{c}");
            prop_assert!(!clean.contains(&ssn));
        }
    }
}
