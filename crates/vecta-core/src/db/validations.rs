//! Validation database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ConfidenceLevel, Validation};

pub(super) const VALIDATION_COLUMNS: &str = r#"
    v.id, v.output_id, v.reviewer_id, v.reviewer_name, v.reviewer_specialty,
    v.certification_level, v.validation_timestamp, v.is_correct, v.confidence_level,
    v.classification_correct, v.confidence_appropriate, v.evidence_accurate,
    v.medication_appropriate, v.comments, v.preferred_classification,
    v.preferred_confidence, v.preferred_evidence, v.preferred_medication,
    v.clinical_pearls, v.common_pitfalls, v.review_time_seconds
"#;

impl Database {
    /// Record an expert validation.
    ///
    /// Runs in one transaction: inserts the row, marks the output validated
    /// and refreshes the reviewer's running totals. Returns the new row ID.
    pub fn insert_validation(&mut self, validation: &Validation) -> DbResult<i64> {
        let tx = self.conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM ai_outputs WHERE id = ?",
                [validation.output_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(DbError::NotFound(format!("output {}", validation.output_id)));
        }

        let timestamp = if validation.validation_timestamp.is_empty() {
            chrono::Utc::now().to_rfc3339()
        } else {
            validation.validation_timestamp.clone()
        };

        tx.execute(
            r#"
            INSERT INTO validations (
                output_id, reviewer_id, reviewer_name, reviewer_specialty,
                certification_level, validation_timestamp, is_correct, confidence_level,
                classification_correct, confidence_appropriate, evidence_accurate,
                medication_appropriate, comments, preferred_classification,
                preferred_confidence, preferred_evidence, preferred_medication,
                clinical_pearls, common_pitfalls, review_time_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
            params![
                validation.output_id,
                validation.reviewer_id,
                validation.reviewer_name,
                validation.reviewer_specialty,
                validation.certification_level,
                timestamp,
                validation.is_correct,
                validation.confidence_level.as_str(),
                validation.classification_correct,
                validation.confidence_appropriate,
                validation.evidence_accurate,
                validation.medication_appropriate,
                validation.comments,
                validation.preferred_classification,
                validation.preferred_confidence,
                validation.preferred_evidence,
                validation.preferred_medication,
                validation.clinical_pearls,
                validation.common_pitfalls,
                validation.review_time_seconds,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE ai_outputs SET validation_status = 'validated' WHERE id = ?",
            [validation.output_id],
        )?;

        tx.execute(
            r#"
            UPDATE reviewers SET
                total_validations = (
                    SELECT COUNT(*) FROM validations WHERE reviewer_id = ?1
                ),
                agreement_rate = (
                    SELECT AVG(CAST(is_correct AS REAL)) FROM validations WHERE reviewer_id = ?1
                ),
                last_login = ?2
            WHERE id = ?1
            "#,
            params![validation.reviewer_id, timestamp],
        )?;

        tx.commit()?;
        Ok(id)
    }

    /// Number of validations that judged the AI output correct.
    pub fn count_correct_validations(&self) -> DbResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM validations WHERE is_correct = 1",
            [],
            |row| row.get(0),
        )?)
    }
}

/// Intermediate row struct for database mapping.
pub(super) struct ValidationRow {
    id: i64,
    output_id: i64,
    reviewer_id: String,
    reviewer_name: Option<String>,
    reviewer_specialty: Option<String>,
    certification_level: Option<String>,
    validation_timestamp: String,
    is_correct: bool,
    confidence_level: String,
    classification_correct: Option<bool>,
    confidence_appropriate: Option<bool>,
    evidence_accurate: Option<bool>,
    medication_appropriate: Option<bool>,
    comments: Option<String>,
    preferred_classification: Option<String>,
    preferred_confidence: Option<String>,
    preferred_evidence: Option<String>,
    preferred_medication: Option<String>,
    clinical_pearls: Option<String>,
    common_pitfalls: Option<String>,
    review_time_seconds: i64,
}

impl ValidationRow {
    /// Read the validation columns starting at `offset`.
    pub(super) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            output_id: row.get(offset + 1)?,
            reviewer_id: row.get(offset + 2)?,
            reviewer_name: row.get(offset + 3)?,
            reviewer_specialty: row.get(offset + 4)?,
            certification_level: row.get(offset + 5)?,
            validation_timestamp: row.get(offset + 6)?,
            is_correct: row.get(offset + 7)?,
            confidence_level: row.get(offset + 8)?,
            classification_correct: row.get(offset + 9)?,
            confidence_appropriate: row.get(offset + 10)?,
            evidence_accurate: row.get(offset + 11)?,
            medication_appropriate: row.get(offset + 12)?,
            comments: row.get(offset + 13)?,
            preferred_classification: row.get(offset + 14)?,
            preferred_confidence: row.get(offset + 15)?,
            preferred_evidence: row.get(offset + 16)?,
            preferred_medication: row.get(offset + 17)?,
            clinical_pearls: row.get(offset + 18)?,
            common_pitfalls: row.get(offset + 19)?,
            review_time_seconds: row.get(offset + 20)?,
        })
    }
}

impl TryFrom<ValidationRow> for Validation {
    type Error = DbError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        let confidence_level = ConfidenceLevel::parse(&row.confidence_level).ok_or_else(|| {
            DbError::Constraint(format!("Unknown confidence level: {}", row.confidence_level))
        })?;

        Ok(Validation {
            id: row.id,
            output_id: row.output_id,
            reviewer_id: row.reviewer_id,
            reviewer_name: row.reviewer_name,
            reviewer_specialty: row.reviewer_specialty,
            certification_level: row.certification_level,
            validation_timestamp: row.validation_timestamp,
            is_correct: row.is_correct,
            confidence_level,
            classification_correct: row.classification_correct,
            confidence_appropriate: row.confidence_appropriate,
            evidence_accurate: row.evidence_accurate,
            medication_appropriate: row.medication_appropriate,
            comments: row.comments,
            preferred_classification: row.preferred_classification,
            preferred_confidence: row.preferred_confidence,
            preferred_evidence: row.preferred_evidence,
            preferred_medication: row.preferred_medication,
            clinical_pearls: row.clinical_pearls,
            common_pitfalls: row.common_pitfalls,
            review_time_seconds: row.review_time_seconds,
        })
    }
}
