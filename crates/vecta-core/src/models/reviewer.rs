//! Expert reviewer (neurologist) models.

use serde::{Deserialize, Serialize};

/// ID of the reviewer seeded into every new database.
pub const DEMO_REVIEWER_ID: &str = "demo_neuro";

/// An expert who validates AI outputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reviewer {
    pub id: String,
    /// Unique contact address
    pub email: String,
    pub name: String,
    pub specialty: Option<String>,
    /// Free-form list, stored as JSON
    pub subspecialties: Vec<String>,
    /// e.g. "attending", "fellow", "resident"
    pub certification_level: Option<String>,
    pub institution: Option<String>,
    pub total_validations: i64,
    /// Fraction of this reviewer's validations that marked the AI correct
    pub agreement_rate: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl Reviewer {
    /// Create a new active reviewer with a generated ID.
    pub fn new(email: String, name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name,
            specialty: None,
            subspecialties: Vec::new(),
            certification_level: None,
            institution: None,
            total_validations: 0,
            agreement_rate: None,
            is_active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_login: None,
        }
    }
}
