//! Few-shot example library.
//!
//! Examples live in a JSON file grouped by category. Most categories are
//! condition slugs (`epilepsy`, `stroke`, ...); the learning engine adds a
//! `validated` category holding expert-approved cases.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::LibraryResult;

/// Category that collects every expert-validated example.
pub const VALIDATED_CATEGORY: &str = "validated";

/// Expected answer of a few-shot example.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpectedOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_support: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_extraction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_analysis: Option<String>,
}

/// Reviewer details attached to a learned example.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpertFeedback {
    pub reviewer: Option<String>,
    pub specialty: Option<String>,
    pub certification: Option<String>,
    pub comments: Option<String>,
    pub clinical_pearls: Option<String>,
    pub validated_on: Option<String>,
}

/// Component ratings attached to a learned example.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityScores {
    pub classification_correct: Option<bool>,
    pub confidence_appropriate: Option<bool>,
    pub evidence_accurate: Option<bool>,
    pub medication_appropriate: Option<bool>,
}

/// A stored input/answer pair injected into prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FewShotExample {
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub specialty: String,
    pub input: String,
    #[serde(default)]
    pub analysis_type: String,
    #[serde(default)]
    pub expected_output: ExpectedOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_feedback: Option<ExpertFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_scores: Option<QualityScores>,
    /// Fields this crate does not interpret, kept so a save does not drop them
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    neurology_few_shot_examples: BTreeMap<String, Vec<FewShotExample>>,
}

/// Per-category example counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryStatistics {
    pub categories: BTreeMap<String, usize>,
    pub total: usize,
}

/// In-memory few-shot library.
#[derive(Debug, Clone, Default)]
pub struct FewShotLibrary {
    categories: BTreeMap<String, Vec<FewShotExample>>,
    path: Option<PathBuf>,
}

impl FewShotLibrary {
    /// Load the library from a JSON file.
    ///
    /// A missing file yields an empty library.
    pub fn load<P: AsRef<Path>>(path: P) -> LibraryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Few-shot examples not found; using empty library");
            return Ok(Self {
                categories: BTreeMap::new(),
                path: Some(path.to_path_buf()),
            });
        }

        let raw = std::fs::read_to_string(path)?;
        let file: LibraryFile = serde_json::from_str(&raw)?;
        let mut library = Self::from_categories(file.neurology_few_shot_examples);
        library.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            categories = library.categories.len(),
            examples = library.len(),
            "Loaded few-shot library"
        );
        Ok(library)
    }

    /// Build a library directly from categories.
    pub fn from_categories(categories: BTreeMap<String, Vec<FewShotExample>>) -> Self {
        Self { categories, path: None }
    }

    /// File the library was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total number of examples across categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Category names in sorted order.
    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Examples stored under a category.
    pub fn category(&self, name: &str) -> &[FewShotExample] {
        self.categories.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Select up to `n` examples for a condition.
    ///
    /// When `analysis_type` is given only examples of that type are
    /// considered. If more than `n` remain, a random sample (or the first `n`
    /// when `random` is false) is returned.
    pub fn examples_for(
        &self,
        condition: &str,
        n: usize,
        analysis_type: Option<&str>,
        random: bool,
    ) -> Vec<FewShotExample> {
        let candidates: Vec<&FewShotExample> = self
            .category(condition)
            .iter()
            .filter(|e| analysis_type.map_or(true, |t| e.analysis_type == t))
            .collect();

        if candidates.len() <= n {
            return candidates.into_iter().cloned().collect();
        }

        if random {
            candidates
                .choose_multiple(&mut rand::thread_rng(), n)
                .map(|e| (*e).clone())
                .collect()
        } else {
            candidates.into_iter().take(n).cloned().collect()
        }
    }

    /// Render examples as the "EXAMPLE ANALYSES" prompt block.
    pub fn format_for_prompt(examples: &[FewShotExample]) -> String {
        if examples.is_empty() {
            return String::new();
        }

        let mut formatted = String::from("EXAMPLE ANALYSES:\n\n");
        for (i, example) in examples.iter().enumerate() {
            let out = &example.expected_output;
            formatted.push_str(&format!("Example {}:\n", i + 1));
            formatted.push_str(&format!("Input: {}\n\n", example.input));
            formatted.push_str("Analysis:\n");

            if let Some(v) = &out.classification {
                formatted.push_str(&format!("- Classification: {}\n", v));
            }
            if let Some(v) = &out.diagnosis_support {
                formatted.push_str(&format!("- Diagnosis Support: {}\n", v));
            }
            if let Some(v) = &out.information_extraction {
                formatted.push_str(&format!("- Information Extraction: {}\n", v));
            }
            if let Some(v) = &out.clinical_summary {
                formatted.push_str(&format!("- Clinical Summary: {}\n", v));
            }

            let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
            formatted.push_str(&format!(
                "- Clinical_Confidence: {}\n",
                or_na(&out.clinical_confidence)
            ));
            formatted.push_str(&format!("- Evidence: {}\n", or_na(&out.evidence)));
            formatted.push_str(&format!(
                "- Medication_Analysis: {}\n",
                or_na(&out.medication_analysis)
            ));
            formatted.push('\n');
        }
        formatted
    }

    /// Example counts per category plus the overall total.
    pub fn statistics(&self) -> LibraryStatistics {
        let categories: BTreeMap<String, usize> = self
            .categories
            .iter()
            .map(|(name, examples)| (name.clone(), examples.len()))
            .collect();
        let total = categories.values().sum();
        LibraryStatistics { categories, total }
    }

    /// IDs already present in the validated category.
    pub fn validated_ids(&self) -> HashSet<&str> {
        self.category(VALIDATED_CATEGORY)
            .iter()
            .map(|e| e.id.as_str())
            .collect()
    }

    /// Add expert-validated examples. Returns how many were new.
    ///
    /// Each new example goes to the `validated` category and to the first
    /// other category whose name contains the example's condition slug.
    pub fn add_validated(&mut self, examples: Vec<FewShotExample>) -> usize {
        let mut existing: HashSet<String> = self
            .validated_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        self.categories
            .entry(VALIDATED_CATEGORY.to_string())
            .or_default();

        let mut added = 0;
        for example in examples {
            if !existing.insert(example.id.clone()) {
                continue;
            }

            let slug = example.condition.to_lowercase().replace(' ', "_");
            if !slug.is_empty() {
                let target = self
                    .categories
                    .keys()
                    .find(|name| {
                        name.as_str() != VALIDATED_CATEGORY && name.to_lowercase().contains(&slug)
                    })
                    .cloned();
                if let Some(name) = target {
                    if let Some(bucket) = self.categories.get_mut(&name) {
                        bucket.push(example.clone());
                    }
                }
            }

            if let Some(bucket) = self.categories.get_mut(VALIDATED_CATEGORY) {
                bucket.push(example);
            }
            added += 1;
        }
        added
    }

    /// Write the library as JSON.
    ///
    /// An existing file is copied to `<name>.json.backup` first. The new
    /// content replaces the file atomically, so a failed save leaves the
    /// previous library in place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LibraryResult<()> {
        let path = path.as_ref();
        let file = LibraryFile {
            neurology_few_shot_examples: self.categories.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if path.exists() {
            std::fs::copy(path, path.with_extension("json.backup"))?;
        }
        super::write_atomic(path, &json)?;
        info!(path = %path.display(), examples = self.len(), "Saved few-shot library");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(id: &str, condition: &str, analysis_type: &str) -> FewShotExample {
        FewShotExample {
            id: id.into(),
            source: "ILAE".into(),
            citation: String::new(),
            source_url: String::new(),
            condition: condition.into(),
            specialty: "neurology".into(),
            input: format!("Case {id}"),
            analysis_type: analysis_type.into(),
            expected_output: ExpectedOutput {
                classification: Some("Focal aware seizure".into()),
                clinical_confidence: Some("High".into()),
                ..Default::default()
            },
            expert_feedback: None,
            quality_scores: None,
            extra: BTreeMap::new(),
        }
    }

    fn library() -> FewShotLibrary {
        let mut categories = BTreeMap::new();
        categories.insert(
            "epilepsy".to_string(),
            vec![
                example("ep1", "epilepsy", "classification"),
                example("ep2", "epilepsy", "classification"),
                example("ep3", "epilepsy", "diagnosis"),
            ],
        );
        categories.insert("stroke".to_string(), vec![example("st1", "stroke", "diagnosis")]);
        FewShotLibrary::from_categories(categories)
    }

    #[test]
    fn test_examples_for_filters_by_type() {
        let lib = library();
        let picked = lib.examples_for("epilepsy", 5, Some("classification"), true);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|e| e.analysis_type == "classification"));

        assert!(lib.examples_for("headache", 2, None, true).is_empty());
    }

    #[test]
    fn test_examples_for_samples_n() {
        let lib = library();
        let first = lib.examples_for("epilepsy", 2, None, false);
        assert_eq!(
            first.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["ep1", "ep2"]
        );

        let random = lib.examples_for("epilepsy", 2, None, true);
        assert_eq!(random.len(), 2);
        assert_ne!(random[0].id, random[1].id);
    }

    #[test]
    fn test_format_for_prompt() {
        let text = FewShotLibrary::format_for_prompt(&[example("ep1", "epilepsy", "classification")]);
        assert!(text.starts_with("EXAMPLE ANALYSES:\n\nExample 1:\nInput: Case ep1\n\nAnalysis:\n"));
        assert!(text.contains("- Classification: Focal aware seizure\n"));
        assert!(text.contains("- Clinical_Confidence: High\n"));
        assert!(text.contains("- Evidence: N/A\n"));
        assert!(text.contains("- Medication_Analysis: N/A\n"));
        assert!(FewShotLibrary::format_for_prompt(&[]).is_empty());
    }

    #[test]
    fn test_statistics() {
        let stats = library().statistics();
        assert_eq!(stats.categories["epilepsy"], 3);
        assert_eq!(stats.total, 4);
    }

    #[test]
    fn test_add_validated_skips_existing_ids() {
        let mut lib = library();
        let added = lib.add_validated(vec![
            example("validated_1", "Epilepsy", "classification"),
            example("validated_1", "Epilepsy", "classification"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(lib.category(VALIDATED_CATEGORY).len(), 1);
        assert_eq!(lib.category("epilepsy").len(), 4);

        assert_eq!(
            lib.add_validated(vec![example("validated_1", "epilepsy", "classification")]),
            0
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lib = FewShotLibrary::load(dir.path().join("missing.json")).unwrap();
        assert!(lib.is_empty());
    }

    #[test]
    fn test_save_keeps_backup_and_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("few_shot_examples.json");
        std::fs::write(
            &path,
            r#"{"neurology_few_shot_examples": {"epilepsy": [
                {"id": "ep1", "input": "Staring spells", "analysis_type": "classification",
                 "expected_output": {"classification": "Absence seizures"},
                 "difficulty": "easy"}
            ]}}"#,
        )
        .unwrap();

        let mut lib = FewShotLibrary::load(&path).unwrap();
        assert_eq!(lib.len(), 1);
        lib.add_validated(vec![example("validated_9", "epilepsy", "classification")]);
        lib.save(&path).unwrap();

        let backup = FewShotLibrary::load(dir.path().join("few_shot_examples.json.backup")).unwrap();
        assert_eq!(backup.len(), 1);
        assert!(!dir.path().join("few_shot_examples.json.tmp").exists());
        let reloaded = FewShotLibrary::load(&path).unwrap();
        assert_eq!(reloaded.category("epilepsy").len(), 2);
        assert_eq!(
            reloaded.category("epilepsy")[0].extra.get("difficulty"),
            Some(&Value::String("easy".into()))
        );
    }

    #[test]
    fn test_failed_save_leaves_library_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("few_shot_examples.json");
        let mut lib = FewShotLibrary::default();
        lib.add_validated(vec![example("validated_1", "stroke", "diagnosis")]);
        lib.save(&path).unwrap();

        std::fs::create_dir(dir.path().join("few_shot_examples.json.tmp")).unwrap();
        lib.add_validated(vec![example("validated_2", "stroke", "diagnosis")]);
        assert!(lib.save(&path).is_err());

        let on_disk = FewShotLibrary::load(&path).unwrap();
        assert_eq!(on_disk.len(), 1);
    }
}
