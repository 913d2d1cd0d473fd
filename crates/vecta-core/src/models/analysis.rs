//! Analysis request vocabulary: task types, specialties and conditions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of analysis requested by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Classification,
    Diagnosis,
    Summary,
    Extraction,
    Custom,
}

impl AnalysisType {
    /// All accepted analysis types, in form order.
    pub const ALL: [AnalysisType; 5] = [
        AnalysisType::Classification,
        AnalysisType::Diagnosis,
        AnalysisType::Summary,
        AnalysisType::Extraction,
        AnalysisType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Classification => "classification",
            AnalysisType::Diagnosis => "diagnosis",
            AnalysisType::Summary => "summary",
            AnalysisType::Extraction => "extraction",
            AnalysisType::Custom => "custom",
        }
    }

    /// Whether model output is forced into the 4-bullet schema.
    pub fn supports_bullets(&self) -> bool {
        !matches!(self, AnalysisType::Custom)
    }

    /// Label of the first bullet for this analysis type.
    pub fn primary_label(&self) -> &'static str {
        match self {
            AnalysisType::Diagnosis => "Diagnosis Support",
            AnalysisType::Summary => "Summarization",
            AnalysisType::Extraction => "Information Extraction",
            AnalysisType::Classification | AnalysisType::Custom => "Classification",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AnalysisType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = AnalysisType::ALL.iter().map(|t| t.as_str()).collect();
                format!(
                    "Invalid analysis type. Must be one of: {}",
                    valid.join(", ")
                )
            })
    }
}

/// Clinical specialty used to pick a specialty activation block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Neurology,
    Cardiology,
    Psychiatry,
    Emergency,
    InternalMedicine,
}

impl Specialty {
    pub const ALL: [Specialty; 5] = [
        Specialty::Neurology,
        Specialty::Cardiology,
        Specialty::Psychiatry,
        Specialty::Emergency,
        Specialty::InternalMedicine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Neurology => "neurology",
            Specialty::Cardiology => "cardiology",
            Specialty::Psychiatry => "psychiatry",
            Specialty::Emergency => "emergency",
            Specialty::InternalMedicine => "internal_medicine",
        }
    }

    /// Parse an optional form value. Empty input means general (no specialty).
    pub fn parse_optional(s: &str) -> Result<Option<Self>, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Specialty::ALL
            .iter()
            .copied()
            .find(|sp| sp.as_str() == normalized)
            .ok_or_else(|| format!("Unknown specialty: {}", s.trim()))
    }
}

/// Neurological condition used to select few-shot examples and guidelines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Epilepsy,
    Parkinsons,
    Stroke,
    Headache,
    Dementia,
    MultipleSclerosis,
    PeripheralNeuropathy,
    MyastheniaGravis,
    SpinalCord,
    MotorNeuronDisease,
}

/// Keyword table scanned in order; the first condition with a hit wins.
const CONDITION_KEYWORDS: &[(Condition, &[&str])] = &[
    (
        Condition::Epilepsy,
        &["seizure", "epilep", "convuls", "eeg", "ictal", "antiseizure", "asm"],
    ),
    (
        Condition::Parkinsons,
        &["parkinson", "tremor", "rigidity", "bradykinesia", "levodopa", "dopamine"],
    ),
    (
        Condition::Stroke,
        &["stroke", "cva", "ischemic", "hemorrhagic", "tpa", "thrombolysis", "hemiparesis"],
    ),
    (
        Condition::Headache,
        &["headache", "migraine", "cephalalgia", "triptan", "ichd"],
    ),
    (
        Condition::Dementia,
        &["dementia", "alzheimer", "cognitive decline", "memory loss", "mmse", "moca"],
    ),
    (
        Condition::MultipleSclerosis,
        &["multiple sclerosis", "ms ", "demyelinating", "optic neuritis"],
    ),
    (
        Condition::PeripheralNeuropathy,
        &["neuropathy", "nerve damage", "polyneuropathy", "diabetic neuropathy"],
    ),
    (
        Condition::MyastheniaGravis,
        &["myasthenia", "mg ", "acetylcholine", "neuromuscular junction"],
    ),
    (
        Condition::SpinalCord,
        &["spinal cord", "myelopathy", "paraplegia", "tetraplegia"],
    ),
    (
        Condition::MotorNeuronDisease,
        &["als ", "amyotrophic lateral sclerosis", "motor neuron"],
    ),
];

impl Condition {
    pub const ALL: [Condition; 10] = [
        Condition::Epilepsy,
        Condition::Parkinsons,
        Condition::Stroke,
        Condition::Headache,
        Condition::Dementia,
        Condition::MultipleSclerosis,
        Condition::PeripheralNeuropathy,
        Condition::MyastheniaGravis,
        Condition::SpinalCord,
        Condition::MotorNeuronDisease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Epilepsy => "epilepsy",
            Condition::Parkinsons => "parkinsons",
            Condition::Stroke => "stroke",
            Condition::Headache => "headache",
            Condition::Dementia => "dementia",
            Condition::MultipleSclerosis => "multiple_sclerosis",
            Condition::PeripheralNeuropathy => "peripheral_neuropathy",
            Condition::MyastheniaGravis => "myasthenia_gravis",
            Condition::SpinalCord => "spinal_cord",
            Condition::MotorNeuronDisease => "motor_neuron_disease",
        }
    }

    /// Detect a condition from free text.
    ///
    /// Falls back to epilepsy for neurology requests with no keyword hit.
    pub fn detect(text: &str, specialty: Option<Specialty>) -> Option<Condition> {
        if text.is_empty() {
            return None;
        }

        let lower = text.to_lowercase();
        for (condition, keywords) in CONDITION_KEYWORDS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return Some(*condition);
            }
        }

        match specialty {
            Some(Specialty::Neurology) => Some(Condition::Epilepsy),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Unknown condition: {}", s.trim()))
    }
}

/// The four fields of a structured model answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredBullets {
    /// Classification / diagnosis / summary / extraction bullet
    pub primary: String,
    pub confidence: String,
    pub evidence: String,
    pub medication: String,
}

impl StructuredBullets {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
            && self.confidence.is_empty()
            && self.evidence.is_empty()
            && self.medication.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_type() {
        assert_eq!("diagnosis".parse::<AnalysisType>().unwrap(), AnalysisType::Diagnosis);
        assert_eq!(" Summary ".parse::<AnalysisType>().unwrap(), AnalysisType::Summary);
        let err = "triage".parse::<AnalysisType>().unwrap_err();
        assert!(err.contains("classification"));
    }

    #[test]
    fn test_primary_labels() {
        assert_eq!(AnalysisType::Classification.primary_label(), "Classification");
        assert_eq!(AnalysisType::Diagnosis.primary_label(), "Diagnosis Support");
        assert_eq!(AnalysisType::Summary.primary_label(), "Summarization");
        assert_eq!(AnalysisType::Extraction.primary_label(), "Information Extraction");
        assert!(!AnalysisType::Custom.supports_bullets());
    }

    #[test]
    fn test_parse_specialty() {
        assert_eq!(Specialty::parse_optional("").unwrap(), None);
        assert_eq!(
            Specialty::parse_optional("internal_medicine").unwrap(),
            Some(Specialty::InternalMedicine)
        );
        assert!(Specialty::parse_optional("dermatology").is_err());
    }

    #[test]
    fn test_detect_condition_keywords() {
        assert_eq!(
            Condition::detect("Patient had a generalized seizure overnight", None),
            Some(Condition::Epilepsy)
        );
        assert_eq!(
            Condition::detect("Resting tremor improving on levodopa", None),
            Some(Condition::Parkinsons)
        );
        assert_eq!(
            Condition::detect("Acute left hemiparesis, CT negative for bleed", None),
            Some(Condition::Stroke)
        );
    }

    #[test]
    fn test_detect_condition_order() {
        // Epilepsy keywords are checked before headache keywords
        assert_eq!(
            Condition::detect("Migraine with an EEG showing spikes", None),
            Some(Condition::Epilepsy)
        );
    }

    #[test]
    fn test_detect_condition_fallback() {
        assert_eq!(
            Condition::detect("Patient reports fatigue", Some(Specialty::Neurology)),
            Some(Condition::Epilepsy)
        );
        assert_eq!(Condition::detect("Patient reports fatigue", None), None);
        assert_eq!(Condition::detect("", Some(Specialty::Neurology)), None);
    }

    #[test]
    fn test_condition_from_str() {
        assert_eq!(
            "multiple sclerosis".parse::<Condition>().unwrap(),
            Condition::MultipleSclerosis
        );
        assert!("gout".parse::<Condition>().is_err());
    }
}
