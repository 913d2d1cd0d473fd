//! Expert validation records.

use serde::{Deserialize, Serialize};

/// Reviewer confidence in their own judgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(ConfidenceLevel::High),
            "medium" => Some(ConfidenceLevel::Medium),
            "low" => Some(ConfidenceLevel::Low),
            _ => None,
        }
    }
}

/// One expert review of a stored AI output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Validation {
    /// Row ID (0 until inserted)
    #[serde(default)]
    pub id: i64,
    pub output_id: i64,
    pub reviewer_id: String,
    pub reviewer_name: Option<String>,
    pub reviewer_specialty: Option<String>,
    pub certification_level: Option<String>,
    #[serde(default)]
    pub validation_timestamp: String,
    pub is_correct: bool,
    #[serde(default)]
    pub confidence_level: ConfidenceLevel,

    // Component ratings
    pub classification_correct: Option<bool>,
    pub confidence_appropriate: Option<bool>,
    pub evidence_accurate: Option<bool>,
    pub medication_appropriate: Option<bool>,

    // Feedback
    pub comments: Option<String>,
    pub preferred_classification: Option<String>,
    pub preferred_confidence: Option<String>,
    pub preferred_evidence: Option<String>,
    pub preferred_medication: Option<String>,

    // Teaching points
    pub clinical_pearls: Option<String>,
    pub common_pitfalls: Option<String>,

    #[serde(default)]
    pub review_time_seconds: i64,
}

impl Validation {
    /// Create a validation by the demo reviewer with only the verdict set.
    pub fn new(output_id: i64, is_correct: bool) -> Self {
        Self {
            id: 0,
            output_id,
            reviewer_id: super::DEMO_REVIEWER_ID.to_string(),
            reviewer_name: Some("Demo Neurologist".into()),
            reviewer_specialty: Some("general_neurology".into()),
            certification_level: Some("attending".into()),
            validation_timestamp: chrono::Utc::now().to_rfc3339(),
            is_correct,
            confidence_level: ConfidenceLevel::Medium,
            classification_correct: None,
            confidence_appropriate: None,
            evidence_accurate: None,
            medication_appropriate: None,
            comments: None,
            preferred_classification: None,
            preferred_confidence: None,
            preferred_evidence: None,
            preferred_medication: None,
            clinical_pearls: None,
            common_pitfalls: None,
            review_time_seconds: 0,
        }
    }

    /// Whether the reviewer supplied any corrected answer.
    pub fn has_corrections(&self) -> bool {
        self.preferred_classification.is_some()
            || self.preferred_confidence.is_some()
            || self.preferred_evidence.is_some()
            || self.preferred_medication.is_some()
    }

    /// Whether every component rating is present and positive.
    pub fn all_components_correct(&self) -> bool {
        [
            self.classification_correct,
            self.confidence_appropriate,
            self.evidence_accurate,
            self.medication_appropriate,
        ]
        .iter()
        .all(|c| *c == Some(true))
    }

    /// Whether this review qualifies its case for the few-shot library.
    pub fn is_learnable(&self) -> bool {
        self.is_correct
            && (self.confidence_level == ConfidenceLevel::High || self.all_components_correct())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learnable_high_confidence() {
        let mut v = Validation::new(1, true);
        v.confidence_level = ConfidenceLevel::High;
        assert!(v.is_learnable());
    }

    #[test]
    fn test_learnable_all_components() {
        let mut v = Validation::new(1, true);
        v.classification_correct = Some(true);
        v.confidence_appropriate = Some(true);
        v.evidence_accurate = Some(true);
        v.medication_appropriate = Some(true);
        assert!(v.is_learnable());

        v.evidence_accurate = None;
        assert!(!v.is_learnable());
    }

    #[test]
    fn test_incorrect_never_learnable() {
        let mut v = Validation::new(1, false);
        v.confidence_level = ConfidenceLevel::High;
        assert!(!v.is_learnable());
    }

    #[test]
    fn test_confidence_level_parse() {
        assert_eq!(ConfidenceLevel::parse("HIGH"), Some(ConfidenceLevel::High));
        assert_eq!(ConfidenceLevel::parse("unsure"), None);
    }
}
