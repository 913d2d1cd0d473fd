//! Aggregate queries over outputs and validations.

use serde::{Deserialize, Serialize};

use super::validations::{ValidationRow, VALIDATION_COLUMNS};
use super::{Database, DbError, DbResult};
use crate::models::{AiOutput, Validation};

/// SQL predicate selecting validations worth learning from.
const LEARNABLE_PREDICATE: &str = r#"
    v.is_correct = 1 AND (
        v.confidence_level = 'high' OR (
            v.classification_correct = 1 AND v.confidence_appropriate = 1
            AND v.evidence_accurate = 1 AND v.medication_appropriate = 1
        )
    )
"#;

/// Dashboard counters for the validation queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationStats {
    pub total_outputs: i64,
    pub validated_count: i64,
    pub pending_count: i64,
    /// Fraction of validations that judged the AI correct
    pub agreement_rate: f64,
    pub today_validations: i64,
}

/// Accuracy figures used to track improvement between learning cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImprovementMetrics {
    pub total_validations: i64,
    pub agreement_rate: f64,
    pub classification_accuracy: f64,
    pub confidence_accuracy: f64,
    pub evidence_accuracy: f64,
    pub medication_accuracy: f64,
    pub learnable_cases: i64,
    pub cases_with_corrections: i64,
    pub clinical_pearls_count: i64,
}

/// A validated output paired with the review that qualified it.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnableCase {
    pub output: AiOutput,
    pub validation: Validation,
}

impl Database {
    /// Counters shown to reviewers.
    pub fn validation_stats(&self) -> DbResult<ValidationStats> {
        let (total_outputs, validated_count, pending_count): (i64, i64, i64) = self.conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(validation_status = 'validated'), 0),
                   COALESCE(SUM(validation_status = 'pending'), 0)
            FROM ai_outputs
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let (agreement_rate, today_validations): (f64, i64) = self.conn.query_row(
            r#"
            SELECT COALESCE(AVG(CAST(is_correct AS REAL)), 0.0),
                   COALESCE(SUM(substr(validation_timestamp, 1, 10) = date('now')), 0)
            FROM validations
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(ValidationStats {
            total_outputs,
            validated_count,
            pending_count,
            agreement_rate,
            today_validations,
        })
    }

    /// Validated cases that qualify for the few-shot library, newest first.
    pub fn learnable_cases(&self) -> DbResult<Vec<LearnableCase>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VALIDATION_COLUMNS} FROM validations v
             JOIN ai_outputs o ON o.id = v.output_id
             WHERE {LEARNABLE_PREDICATE}
             ORDER BY v.validation_timestamp DESC, v.id DESC"
        ))?;

        let rows = stmt.query_map([], |row| ValidationRow::from_row(row, 0))?;

        let mut cases = Vec::new();
        for row in rows {
            let validation: Validation = row?.try_into()?;
            let output = self
                .get_output(validation.output_id)?
                .ok_or_else(|| DbError::NotFound(format!("output {}", validation.output_id)))?;
            cases.push(LearnableCase { output, validation });
        }
        Ok(cases)
    }

    /// Accuracy metrics across every recorded validation.
    ///
    /// Component accuracies count unrated components as incorrect.
    pub fn improvement_metrics(&self) -> DbResult<ImprovementMetrics> {
        let mut metrics = self.conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(AVG(CAST(is_correct AS REAL)), 0.0),
                   COALESCE(CAST(SUM(classification_correct = 1) AS REAL) / NULLIF(COUNT(*), 0), 0.0),
                   COALESCE(CAST(SUM(confidence_appropriate = 1) AS REAL) / NULLIF(COUNT(*), 0), 0.0),
                   COALESCE(CAST(SUM(evidence_accurate = 1) AS REAL) / NULLIF(COUNT(*), 0), 0.0),
                   COALESCE(CAST(SUM(medication_appropriate = 1) AS REAL) / NULLIF(COUNT(*), 0), 0.0),
                   COALESCE(SUM(
                       preferred_classification IS NOT NULL OR preferred_confidence IS NOT NULL
                       OR preferred_evidence IS NOT NULL OR preferred_medication IS NOT NULL
                   ), 0),
                   COALESCE(SUM(clinical_pearls IS NOT NULL AND clinical_pearls != ''), 0)
            FROM validations
            "#,
            [],
            |row| {
                Ok(ImprovementMetrics {
                    total_validations: row.get(0)?,
                    agreement_rate: row.get(1)?,
                    classification_accuracy: row.get(2)?,
                    confidence_accuracy: row.get(3)?,
                    evidence_accuracy: row.get(4)?,
                    medication_accuracy: row.get(5)?,
                    learnable_cases: 0,
                    cases_with_corrections: row.get(6)?,
                    clinical_pearls_count: row.get(7)?,
                })
            },
        )?;

        metrics.learnable_cases = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM validations v WHERE {LEARNABLE_PREDICATE}"),
            [],
            |row| row.get(0),
        )?;

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfidenceLevel;

    fn seed(db: &mut Database, correct: bool, confidence: ConfidenceLevel) -> i64 {
        let output_id = db
            .insert_output(&AiOutput::new("Tremor and rigidity", None))
            .unwrap();
        let mut validation = Validation::new(output_id, correct);
        validation.confidence_level = confidence;
        db.insert_validation(&validation).unwrap();
        output_id
    }

    #[test]
    fn test_empty_stats() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.validation_stats().unwrap();
        assert_eq!(stats, ValidationStats::default());

        let metrics = db.improvement_metrics().unwrap();
        assert_eq!(metrics.total_validations, 0);
        assert_eq!(metrics.agreement_rate, 0.0);
    }

    #[test]
    fn test_validation_stats() {
        let mut db = Database::open_in_memory().unwrap();
        seed(&mut db, true, ConfidenceLevel::High);
        seed(&mut db, false, ConfidenceLevel::Low);
        db.insert_output(&AiOutput::new("Unreviewed", None)).unwrap();

        let stats = db.validation_stats().unwrap();
        assert_eq!(stats.total_outputs, 3);
        assert_eq!(stats.validated_count, 2);
        assert_eq!(stats.pending_count, 1);
        assert!((stats.agreement_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.today_validations, 2);
    }

    #[test]
    fn test_learnable_cases_filter() {
        let mut db = Database::open_in_memory().unwrap();
        let learnable = seed(&mut db, true, ConfidenceLevel::High);
        seed(&mut db, true, ConfidenceLevel::Medium);
        seed(&mut db, false, ConfidenceLevel::High);

        let cases = db.learnable_cases().unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].output.id, learnable);
        assert!(cases[0].validation.is_learnable());
    }

    #[test]
    fn test_improvement_metrics() {
        let mut db = Database::open_in_memory().unwrap();
        let output_id = db.insert_output(&AiOutput::new("Stroke", None)).unwrap();

        let mut validation = Validation::new(output_id, true);
        validation.classification_correct = Some(true);
        validation.confidence_appropriate = Some(true);
        validation.evidence_accurate = Some(true);
        validation.medication_appropriate = Some(false);
        validation.preferred_medication = Some("Start aspirin".into());
        validation.clinical_pearls = Some("Check glucose first".into());
        db.insert_validation(&validation).unwrap();

        let metrics = db.improvement_metrics().unwrap();
        assert_eq!(metrics.total_validations, 1);
        assert_eq!(metrics.classification_accuracy, 1.0);
        assert_eq!(metrics.medication_accuracy, 0.0);
        assert_eq!(metrics.cases_with_corrections, 1);
        assert_eq!(metrics.clinical_pearls_count, 1);
        assert_eq!(metrics.learnable_cases, 0);
    }
}
