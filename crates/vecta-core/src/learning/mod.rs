//! Self-improvement from expert validations.
//!
//! A learning cycle turns validated cases into few-shot examples:
//!
//! ```text
//! validations ──▶ learnable cases ──▶ FewShotExample ──▶ few_shot_examples.json
//!                                                     └──▶ learning_history.json
//! ```
//!
//! Expert corrections take precedence over the AI's own answer.

mod history;

pub use history::*;

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError, DbResult, ImprovementMetrics, LearnableCase};
use crate::library::{
    ExpectedOutput, ExpertFeedback, FewShotExample, FewShotLibrary, LibraryError, QualityScores,
    VALIDATED_CATEGORY,
};

/// Learning errors.
#[derive(Error, Debug)]
pub enum LearningError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type LearningResult<T> = Result<T, LearningError>;

/// Inputs at least this similar to an existing validated example are skipped.
pub const DUPLICATE_SIMILARITY: f64 = 0.95;

/// File locations used by the learning engine.
#[derive(Debug, Clone)]
pub struct LearningConfig {
    pub library_path: PathBuf,
    pub history_path: PathBuf,
    pub duplicate_similarity: f64,
}

impl LearningConfig {
    /// Standard file names inside a data directory.
    pub fn in_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            library_path: data_dir.join("few_shot_examples.json"),
            history_path: data_dir.join("learning_history.json"),
            duplicate_similarity: DUPLICATE_SIMILARITY,
        }
    }
}

/// Summary of one learning cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningReport {
    pub success: bool,
    pub duration_seconds: f64,
    pub cases_processed: usize,
    pub examples_added: usize,
    pub current_agreement_rate: f64,
    pub total_validations: i64,
    pub learnable_cases_remaining: i64,
    pub metrics: ImprovementMetrics,
    pub timestamp: String,
}

/// Turns expert validations into few-shot examples.
pub struct LearningEngine {
    config: LearningConfig,
    history: LearningHistory,
}

impl LearningEngine {
    /// Create an engine, loading any previous history.
    pub fn new(config: LearningConfig) -> LearningResult<Self> {
        let history = LearningHistory::load(&config.history_path)?;
        Ok(Self { config, history })
    }

    /// Learnable cases converted to few-shot examples, newest first.
    pub fn extract_validated_cases(&self, db: &Database) -> DbResult<Vec<FewShotExample>> {
        let today = chrono::Utc::now().format("%Y%m%d").to_string();
        let examples: Vec<FewShotExample> = db
            .learnable_cases()?
            .into_iter()
            .map(|case| case_to_example(case, &today))
            .collect();
        info!(cases = examples.len(), "Extracted validated cases");
        Ok(examples)
    }

    /// Merge cases into the library. Returns how many were added.
    ///
    /// Cases whose input nearly matches an existing validated example are
    /// dropped before merging.
    pub fn update_library(&self, library: &mut FewShotLibrary, cases: Vec<FewShotExample>) -> usize {
        let mut known_inputs: Vec<String> = library
            .category(VALIDATED_CATEGORY)
            .iter()
            .map(|e| e.input.clone())
            .collect();

        let mut fresh = Vec::new();
        for case in cases {
            let duplicate = known_inputs
                .iter()
                .any(|known| normalized_levenshtein(known, &case.input) >= self.config.duplicate_similarity);
            if duplicate {
                continue;
            }
            known_inputs.push(case.input.clone());
            fresh.push(case);
        }

        library.add_validated(fresh)
    }

    /// Run a full cycle: extract, merge, save, record.
    pub fn run_cycle(&mut self, db: &Database) -> LearningResult<LearningReport> {
        let started = Instant::now();
        let timestamp = chrono::Utc::now().to_rfc3339();
        info!("Starting learning cycle");

        let cases = self.extract_validated_cases(db)?;
        let cases_processed = cases.len();

        let mut library = FewShotLibrary::load(&self.config.library_path)?;
        let examples_added = self.update_library(&mut library, cases);
        if examples_added > 0 {
            library.save(&self.config.library_path)?;
        } else {
            info!("No new examples to add");
        }

        let metrics = db.improvement_metrics()?;

        self.history.record(LearningEvent {
            timestamp: timestamp.clone(),
            cases_reviewed: cases_processed,
            examples_added,
            agreement_rate: metrics.agreement_rate,
            learnable_cases: metrics.learnable_cases,
            metrics: metrics.clone(),
        });
        self.history.save(&self.config.history_path)?;

        let duration_seconds = started.elapsed().as_secs_f64();
        info!(
            examples_added,
            agreement_rate = metrics.agreement_rate,
            duration_seconds,
            "Learning cycle complete"
        );

        Ok(LearningReport {
            success: true,
            duration_seconds,
            cases_processed,
            examples_added,
            current_agreement_rate: metrics.agreement_rate,
            total_validations: metrics.total_validations,
            learnable_cases_remaining: metrics.learnable_cases,
            metrics,
            timestamp,
        })
    }
}

fn case_to_example(case: LearnableCase, date: &str) -> FewShotExample {
    let LearnableCase { output, validation: v } = case;
    let reviewer = v.reviewer_name.clone().unwrap_or_else(|| v.reviewer_id.clone());
    let certification = v
        .certification_level
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    FewShotExample {
        id: format!("validated_{}_{}", output.id, date),
        source: "Expert Validated".to_string(),
        citation: format!("Validated by {reviewer} ({certification})"),
        source_url: "internal_validation".to_string(),
        condition: output.condition.unwrap_or_else(|| "General".to_string()),
        specialty: output.specialty,
        input: output.input_text,
        analysis_type: output
            .input_type
            .unwrap_or_else(|| "classification".to_string()),
        expected_output: ExpectedOutput {
            classification: v.preferred_classification.clone().or(output.ai_classification),
            clinical_confidence: v.preferred_confidence.clone().or(output.ai_confidence),
            evidence: v.preferred_evidence.clone().or(output.ai_evidence),
            medication_analysis: v
                .preferred_medication
                .clone()
                .or(output.ai_medication_analysis),
            ..Default::default()
        },
        expert_feedback: Some(ExpertFeedback {
            reviewer: Some(reviewer),
            specialty: v.reviewer_specialty.clone(),
            certification: v.certification_level.clone(),
            comments: v.comments.clone(),
            clinical_pearls: v.clinical_pearls.clone(),
            validated_on: Some(v.validation_timestamp.clone()),
        }),
        quality_scores: Some(QualityScores {
            classification_correct: v.classification_correct,
            confidence_appropriate: v.confidence_appropriate,
            evidence_accurate: v.evidence_accurate,
            medication_appropriate: v.medication_appropriate,
        }),
        extra: Default::default(),
    }
}
