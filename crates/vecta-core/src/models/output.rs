//! AI output records sampled for expert review.

use serde::{Deserialize, Serialize};

use super::analysis::StructuredBullets;

/// Review status of a stored AI output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Awaiting expert review
    Pending,
    /// At least one expert validation recorded
    Validated,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Validated => "validated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ValidationStatus::Pending),
            "validated" => Some(ValidationStatus::Validated),
            _ => None,
        }
    }
}

/// A stored model answer awaiting (or carrying) expert validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiOutput {
    /// Row ID (0 until inserted)
    pub id: i64,
    pub timestamp: String,
    /// Input text, capped before storage
    pub input_text: String,
    /// Analysis type that produced the output
    pub input_type: Option<String>,
    pub condition: Option<String>,
    pub specialty: String,
    pub ai_classification: Option<String>,
    pub ai_confidence: Option<String>,
    pub ai_evidence: Option<String>,
    pub ai_medication_analysis: Option<String>,
    pub ai_full_response: Option<String>,
    pub model_version: Option<String>,
    pub prompt_version: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub validation_status: ValidationStatus,
    /// Higher values are served to reviewers first
    pub validation_priority: i64,
    pub selected_for_validation: bool,
    pub selection_date: Option<String>,
    /// Hashed caller identifier
    pub session_id: Option<String>,
    pub user_context: Option<String>,
}

/// Maximum number of input characters kept with a stored output.
pub const MAX_STORED_INPUT_CHARS: usize = 1000;

impl AiOutput {
    /// Create a new pending output selected for validation.
    pub fn new(input_text: &str, specialty: Option<&str>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0,
            timestamp: now.clone(),
            input_text: input_text.chars().take(MAX_STORED_INPUT_CHARS).collect(),
            input_type: None,
            condition: None,
            specialty: specialty.unwrap_or("neurology").to_string(),
            ai_classification: None,
            ai_confidence: None,
            ai_evidence: None,
            ai_medication_analysis: None,
            ai_full_response: None,
            model_version: None,
            prompt_version: None,
            processing_time_ms: None,
            validation_status: ValidationStatus::Pending,
            validation_priority: 1,
            selected_for_validation: true,
            selection_date: Some(now),
            session_id: None,
            user_context: None,
        }
    }

    /// Attach the structured fields parsed from the model answer.
    pub fn with_bullets(mut self, bullets: &StructuredBullets) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        self.ai_classification = non_empty(&bullets.primary);
        self.ai_confidence = non_empty(&bullets.confidence);
        self.ai_evidence = non_empty(&bullets.evidence);
        self.ai_medication_analysis = non_empty(&bullets.medication);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_caps_input() {
        let long = "a".repeat(5000);
        let output = AiOutput::new(&long, None);
        assert_eq!(output.input_text.chars().count(), MAX_STORED_INPUT_CHARS);
        assert_eq!(output.specialty, "neurology");
        assert_eq!(output.validation_status, ValidationStatus::Pending);
        assert!(output.selected_for_validation);
    }

    #[test]
    fn test_with_bullets_skips_empty_fields() {
        let bullets = StructuredBullets {
            primary: "Focal epilepsy".into(),
            confidence: "High".into(),
            evidence: String::new(),
            medication: "Levetiracetam".into(),
        };
        let output = AiOutput::new("text", Some("neurology")).with_bullets(&bullets);
        assert_eq!(output.ai_classification.as_deref(), Some("Focal epilepsy"));
        assert_eq!(output.ai_evidence, None);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(ValidationStatus::parse("pending"), Some(ValidationStatus::Pending));
        assert_eq!(ValidationStatus::parse("validated"), Some(ValidationStatus::Validated));
        assert_eq!(ValidationStatus::parse("done"), None);
    }
}
