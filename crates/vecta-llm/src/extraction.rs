//! Structured bullet extraction from model output.
//!
//! The model is asked to end with four `- Label: content` bullets. Models do
//! not always comply, so extraction is best effort: trailing bullets are
//! relabelled and trimmed when present, otherwise key sentences are picked
//! out of the free text by keyword.

use vecta_core::models::{AnalysisType, StructuredBullets};

/// Maximum words kept per bullet.
pub const MAX_BULLET_WORDS: usize = 25;

/// Maximum characters kept for a sentence picked by the keyword fallback.
const MAX_SENTENCE_CHARS: usize = 100;

const DEFAULT_BULLET: &str = "Analysis completed using clinical reasoning";
const DEFAULT_PRIMARY: &str = "Clinical analysis completed";
const DEFAULT_EVIDENCE: &str = "Based on clinical data provided";
const DEFAULT_MEDICATION: &str = "Clinical recommendations provided";

const TREATMENT_KEYWORDS: &[&str] = &["treatment", "medication", "therapy", "recommend"];

/// Bullet labels that carry the primary finding, one per analysis type.
const PRIMARY_LABELS: &[&str] = &[
    "Classification:",
    "Diagnosis Support:",
    "Summarization:",
    "Information Extraction:",
];

/// Labels in output order for an analysis type.
pub fn expected_labels(analysis_type: AnalysisType) -> [&'static str; 4] {
    [
        analysis_type.primary_label(),
        "Clinical_Confidence",
        "Evidence",
        "Medication_Analysis",
    ]
}

/// Reduce a model response to exactly four labelled bullet lines.
pub fn extract_structured_bullets(text: &str, analysis_type: AnalysisType) -> String {
    let labels = expected_labels(analysis_type);

    let trailing = trailing_bullets(text);
    if trailing.len() == labels.len() {
        // Bullets without a `label: content` shape are dropped, so later
        // bullets shift up and missing tail positions get the default.
        let contents: Vec<String> = trailing
            .iter()
            .filter_map(|line| line.split_once(':'))
            .map(|(_, content)| cap_words(content.trim(), MAX_BULLET_WORDS))
            .collect();

        return labels
            .iter()
            .enumerate()
            .map(|(i, label)| match contents.get(i) {
                Some(content) => format!("- {label}: {content}"),
                None => format!("- {label}: {DEFAULT_BULLET}"),
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    let bullets = keyword_fallback(text);
    format!(
        "- {}: {}\n- {}: {}\n- {}: {}\n- {}: {}",
        labels[0],
        bullets.primary,
        labels[1],
        bullets.confidence,
        labels[2],
        bullets.evidence,
        labels[3],
        bullets.medication,
    )
}

/// Read the four fields back out of bullet text for storage.
///
/// Later lines overwrite earlier ones. Fields that never appear stay empty.
pub fn parse_bullet_fields(text: &str) -> StructuredBullets {
    let mut bullets = StructuredBullets::default();

    for line in text.lines() {
        let Some((_, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();

        if PRIMARY_LABELS.iter().any(|label| line.contains(label)) {
            bullets.primary = value;
        } else if line.contains("Confidence:") {
            bullets.confidence = value;
        } else if line.contains("Evidence:") {
            bullets.evidence = value;
        } else if line.contains("Medication") {
            bullets.medication = value;
        }
    }

    bullets
}

/// Up to four `- ` lines, scanning from the end, in original order.
fn trailing_bullets(text: &str) -> Vec<&str> {
    let mut found: Vec<&str> = text
        .trim()
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with("- "))
        .take(4)
        .collect();
    found.reverse();
    found
}

fn keyword_fallback(text: &str) -> StructuredBullets {
    let lower = text.to_lowercase();
    let confidence = if lower.contains("confidence") && lower.contains("high") {
        "HIGH"
    } else if lower.contains("confidence") && lower.contains("low") {
        "LOW"
    } else {
        "MEDIUM"
    };

    let sentences: Vec<String> = text
        .split('.')
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect();

    let first_with = |keywords: &[&str]| {
        sentences
            .iter()
            .find(|s| {
                let s = s.to_lowercase();
                keywords.iter().any(|k| s.contains(k))
            })
            .map(|s| cap_chars(s, MAX_SENTENCE_CHARS))
    };

    StructuredBullets {
        primary: sentences
            .first()
            .map(|s| cap_chars(s, MAX_SENTENCE_CHARS))
            .unwrap_or_else(|| DEFAULT_PRIMARY.to_string()),
        confidence: confidence.to_string(),
        evidence: first_with(&["evidence"]).unwrap_or_else(|| DEFAULT_EVIDENCE.to_string()),
        medication: first_with(TREATMENT_KEYWORDS)
            .unwrap_or_else(|| DEFAULT_MEDICATION.to_string()),
    }
}

fn cap_words(text: &str, max: usize) -> String {
    text.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

fn cap_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
