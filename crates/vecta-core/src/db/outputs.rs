//! AI output database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{AiOutput, ValidationStatus};

const OUTPUT_COLUMNS: &str = r#"
    id, timestamp, input_text, input_type, condition, specialty,
    ai_classification, ai_confidence, ai_evidence, ai_medication_analysis,
    ai_full_response, model_version, prompt_version, processing_time_ms,
    validation_status, validation_priority, selected_for_validation,
    selection_date, session_id, user_context
"#;

impl Database {
    /// Insert an AI output and return its row ID.
    pub fn insert_output(&self, output: &AiOutput) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO ai_outputs (
                timestamp, input_text, input_type, condition, specialty,
                ai_classification, ai_confidence, ai_evidence, ai_medication_analysis,
                ai_full_response, model_version, prompt_version, processing_time_ms,
                validation_status, validation_priority, selected_for_validation,
                selection_date, session_id, user_context
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                output.timestamp,
                output.input_text,
                output.input_type,
                output.condition,
                output.specialty,
                output.ai_classification,
                output.ai_confidence,
                output.ai_evidence,
                output.ai_medication_analysis,
                output.ai_full_response,
                output.model_version,
                output.prompt_version,
                output.processing_time_ms,
                output.validation_status.as_str(),
                output.validation_priority,
                output.selected_for_validation,
                output.selection_date,
                output.session_id,
                output.user_context,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get an output by ID.
    pub fn get_output(&self, id: i64) -> DbResult<Option<AiOutput>> {
        self.conn
            .query_row(
                &format!("SELECT {OUTPUT_COLUMNS} FROM ai_outputs WHERE id = ?"),
                [id],
                OutputRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Next case for a reviewer.
    ///
    /// Pending outputs selected for validation come first, highest priority
    /// first and random within a priority. Falls back to any pending output.
    pub fn next_validation_case(&self) -> DbResult<Option<AiOutput>> {
        let selected = self
            .conn
            .query_row(
                &format!(
                    "SELECT {OUTPUT_COLUMNS} FROM ai_outputs
                     WHERE validation_status = 'pending' AND selected_for_validation = 1
                     ORDER BY validation_priority DESC, RANDOM()
                     LIMIT 1"
                ),
                [],
                OutputRow::from_row,
            )
            .optional()?;

        let row = match selected {
            Some(row) => Some(row),
            None => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {OUTPUT_COLUMNS} FROM ai_outputs
                         WHERE validation_status = 'pending'
                         ORDER BY RANDOM()
                         LIMIT 1"
                    ),
                    [],
                    OutputRow::from_row,
                )
                .optional()?,
        };

        row.map(|row| row.try_into()).transpose()
    }
}

/// Intermediate row struct for database mapping.
struct OutputRow {
    id: i64,
    timestamp: String,
    input_text: String,
    input_type: Option<String>,
    condition: Option<String>,
    specialty: String,
    ai_classification: Option<String>,
    ai_confidence: Option<String>,
    ai_evidence: Option<String>,
    ai_medication_analysis: Option<String>,
    ai_full_response: Option<String>,
    model_version: Option<String>,
    prompt_version: Option<String>,
    processing_time_ms: Option<i64>,
    validation_status: String,
    validation_priority: i64,
    selected_for_validation: bool,
    selection_date: Option<String>,
    session_id: Option<String>,
    user_context: Option<String>,
}

impl OutputRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            input_text: row.get(2)?,
            input_type: row.get(3)?,
            condition: row.get(4)?,
            specialty: row.get(5)?,
            ai_classification: row.get(6)?,
            ai_confidence: row.get(7)?,
            ai_evidence: row.get(8)?,
            ai_medication_analysis: row.get(9)?,
            ai_full_response: row.get(10)?,
            model_version: row.get(11)?,
            prompt_version: row.get(12)?,
            processing_time_ms: row.get(13)?,
            validation_status: row.get(14)?,
            validation_priority: row.get(15)?,
            selected_for_validation: row.get(16)?,
            selection_date: row.get(17)?,
            session_id: row.get(18)?,
            user_context: row.get(19)?,
        })
    }
}

impl TryFrom<OutputRow> for AiOutput {
    type Error = DbError;

    fn try_from(row: OutputRow) -> Result<Self, Self::Error> {
        let validation_status = ValidationStatus::parse(&row.validation_status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown validation status: {}", row.validation_status))
        })?;

        Ok(AiOutput {
            id: row.id,
            timestamp: row.timestamp,
            input_text: row.input_text,
            input_type: row.input_type,
            condition: row.condition,
            specialty: row.specialty,
            ai_classification: row.ai_classification,
            ai_confidence: row.ai_confidence,
            ai_evidence: row.ai_evidence,
            ai_medication_analysis: row.ai_medication_analysis,
            ai_full_response: row.ai_full_response,
            model_version: row.model_version,
            prompt_version: row.prompt_version,
            processing_time_ms: row.processing_time_ms,
            validation_status,
            validation_priority: row.validation_priority,
            selected_for_validation: row.selected_for_validation,
            selection_date: row.selection_date,
            session_id: row.session_id,
            user_context: row.user_context,
        })
    }
}
