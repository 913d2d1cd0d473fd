//! Reviewer database operations.

use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::Reviewer;

impl Database {
    /// Insert a reviewer, or update the existing row with the same ID.
    ///
    /// An email already held by another reviewer is a [`DbError::Conflict`].
    pub fn upsert_reviewer(&self, reviewer: &Reviewer) -> DbResult<()> {
        let subspecialties_json = serde_json::to_string(&reviewer.subspecialties)?;

        self.conn.execute(
            r#"
            INSERT INTO reviewers (
                id, email, name, specialty, subspecialties, certification_level,
                institution, total_validations, agreement_rate, is_active,
                created_at, last_login
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                specialty = excluded.specialty,
                subspecialties = excluded.subspecialties,
                certification_level = excluded.certification_level,
                institution = excluded.institution,
                is_active = excluded.is_active,
                last_login = excluded.last_login
            "#,
            params![
                reviewer.id,
                reviewer.email,
                reviewer.name,
                reviewer.specialty,
                subspecialties_json,
                reviewer.certification_level,
                reviewer.institution,
                reviewer.total_validations,
                reviewer.agreement_rate,
                reviewer.is_active,
                reviewer.created_at,
                reviewer.last_login,
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => {
                DbError::Conflict(format!("email {} is already registered", reviewer.email))
            }
            _ => DbError::Sqlite(e),
        })?;
        Ok(())
    }

    /// Get a reviewer by ID.
    pub fn get_reviewer(&self, id: &str) -> DbResult<Option<Reviewer>> {
        self.conn
            .query_row(
                r#"
                SELECT id, email, name, specialty, subspecialties, certification_level,
                       institution, total_validations, agreement_rate, is_active,
                       created_at, last_login
                FROM reviewers
                WHERE id = ?
                "#,
                [id],
                ReviewerRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all reviewers ordered by name.
    pub fn list_reviewers(&self) -> DbResult<Vec<Reviewer>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email, name, specialty, subspecialties, certification_level,
                   institution, total_validations, agreement_rate, is_active,
                   created_at, last_login
            FROM reviewers
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([], ReviewerRow::from_row)?;

        let mut reviewers = Vec::new();
        for row in rows {
            reviewers.push(row?.try_into()?);
        }
        Ok(reviewers)
    }
}

/// Intermediate row struct for database mapping.
struct ReviewerRow {
    id: String,
    email: String,
    name: String,
    specialty: Option<String>,
    subspecialties: String,
    certification_level: Option<String>,
    institution: Option<String>,
    total_validations: i64,
    agreement_rate: Option<f64>,
    is_active: bool,
    created_at: String,
    last_login: Option<String>,
}

impl ReviewerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            specialty: row.get(3)?,
            subspecialties: row.get(4)?,
            certification_level: row.get(5)?,
            institution: row.get(6)?,
            total_validations: row.get(7)?,
            agreement_rate: row.get(8)?,
            is_active: row.get(9)?,
            created_at: row.get(10)?,
            last_login: row.get(11)?,
        })
    }
}

impl TryFrom<ReviewerRow> for Reviewer {
    type Error = DbError;

    fn try_from(row: ReviewerRow) -> Result<Self, Self::Error> {
        let subspecialties: Vec<String> = serde_json::from_str(&row.subspecialties)?;

        Ok(Reviewer {
            id: row.id,
            email: row.email,
            name: row.name,
            specialty: row.specialty,
            subspecialties,
            certification_level: row.certification_level,
            institution: row.institution,
            total_validations: row.total_validations,
            agreement_rate: row.agreement_rate,
            is_active: row.is_active,
            created_at: row.created_at,
            last_login: row.last_login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEMO_REVIEWER_ID;

    #[test]
    fn test_demo_reviewer_seeded() {
        let db = Database::open_in_memory().unwrap();
        let demo = db.get_reviewer(DEMO_REVIEWER_ID).unwrap().unwrap();
        assert_eq!(demo.email, "demo@vecta.ai");
        assert_eq!(demo.certification_level.as_deref(), Some("attending"));
        assert!(demo.subspecialties.is_empty());
    }

    #[test]
    fn test_upsert_reviewer() {
        let db = Database::open_in_memory().unwrap();
        let mut reviewer = Reviewer::new("lee@example.org".into(), "Dr. Lee".into());
        reviewer.subspecialties = vec!["epilepsy".into(), "sleep".into()];
        db.upsert_reviewer(&reviewer).unwrap();

        reviewer.institution = Some("General Hospital".into());
        db.upsert_reviewer(&reviewer).unwrap();

        let retrieved = db.get_reviewer(&reviewer.id).unwrap().unwrap();
        assert_eq!(retrieved.institution.as_deref(), Some("General Hospital"));
        assert_eq!(retrieved.subspecialties, vec!["epilepsy", "sleep"]);
        assert_eq!(db.list_reviewers().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        let reviewer = Reviewer::new("demo@vecta.ai".into(), "Impostor".into());
        let err = db.upsert_reviewer(&reviewer).unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m.contains("demo@vecta.ai")));
    }
}
