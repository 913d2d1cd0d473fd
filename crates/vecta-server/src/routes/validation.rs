//! Expert review endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use vecta_core::models::{ConfidenceLevel, DEMO_REVIEWER_ID};
use vecta_core::{Reviewer, Validation, ValidationStats};

use super::blocking;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/next-case", get(next_case))
        .route("/api/submit-validation", post(submit_validation))
        .route("/api/stats", get(stats))
        .route("/api/reviewers", get(list_reviewers).post(register_reviewer))
        .route("/api/reviewers/:id", get(get_reviewer))
}

/// Review submitted for a stored case.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitValidation {
    pub case_id: i64,
    pub is_correct: bool,
    #[serde(alias = "neurologist_id")]
    pub reviewer_id: Option<String>,
    #[serde(alias = "neurologist_name")]
    pub reviewer_name: Option<String>,
    #[serde(alias = "neurologist_specialty")]
    pub reviewer_specialty: Option<String>,
    pub certification_level: Option<String>,
    pub confidence_level: Option<String>,
    pub comments: Option<String>,
    pub preferred_classification: Option<String>,
    pub preferred_confidence: Option<String>,
    pub preferred_evidence: Option<String>,
    pub preferred_medication: Option<String>,
    pub classification_correct: Option<bool>,
    pub confidence_appropriate: Option<bool>,
    pub evidence_accurate: Option<bool>,
    pub medication_appropriate: Option<bool>,
    pub clinical_pearls: Option<String>,
    pub common_pitfalls: Option<String>,
    pub review_time_seconds: Option<i64>,
}

impl SubmitValidation {
    /// Convert to a stored validation. Omitted reviewer fields keep the demo reviewer.
    pub fn into_validation(self) -> ApiResult<Validation> {
        let confidence_level = match self.confidence_level.as_deref() {
            None | Some("") => ConfidenceLevel::Medium,
            Some(raw) => ConfidenceLevel::parse(raw).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Invalid confidence level: {raw}. Must be one of: high, medium, low"
                ))
            })?,
        };

        let mut validation = Validation::new(self.case_id, self.is_correct);
        validation.reviewer_id = non_empty(self.reviewer_id).unwrap_or_else(|| DEMO_REVIEWER_ID.to_string());
        if let Some(name) = non_empty(self.reviewer_name) {
            validation.reviewer_name = Some(name);
        }
        if let Some(specialty) = non_empty(self.reviewer_specialty) {
            validation.reviewer_specialty = Some(specialty);
        }
        if let Some(level) = non_empty(self.certification_level) {
            validation.certification_level = Some(level);
        }
        validation.confidence_level = confidence_level;
        validation.comments = non_empty(self.comments);
        validation.preferred_classification = non_empty(self.preferred_classification);
        validation.preferred_confidence = non_empty(self.preferred_confidence);
        validation.preferred_evidence = non_empty(self.preferred_evidence);
        validation.preferred_medication = non_empty(self.preferred_medication);
        validation.classification_correct = self.classification_correct;
        validation.confidence_appropriate = self.confidence_appropriate;
        validation.evidence_accurate = self.evidence_accurate;
        validation.medication_appropriate = self.medication_appropriate;
        validation.clinical_pearls = non_empty(self.clinical_pearls);
        validation.common_pitfalls = non_empty(self.common_pitfalls);
        validation.review_time_seconds = self.review_time_seconds.unwrap_or(0).max(0);
        Ok(validation)
    }
}

/// Reviewer profile submitted to the portal.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterReviewer {
    pub id: Option<String>,
    pub email: String,
    pub name: String,
    pub specialty: Option<String>,
    #[serde(default)]
    pub subspecialties: Vec<String>,
    pub certification_level: Option<String>,
    pub institution: Option<String>,
}

impl RegisterReviewer {
    /// Without an ID a new one is generated; with a known ID the profile is updated.
    pub fn into_reviewer(self) -> ApiResult<Reviewer> {
        let email = self.email.trim();
        if !email.contains('@') {
            return Err(ApiError::BadRequest("A valid email is required".into()));
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Reviewer name is required".into()));
        }

        let mut reviewer = Reviewer::new(email.to_string(), name.to_string());
        if let Some(id) = non_empty(self.id) {
            reviewer.id = id;
        }
        reviewer.specialty = non_empty(self.specialty);
        reviewer.subspecialties = self
            .subspecialties
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        reviewer.certification_level = non_empty(self.certification_level);
        reviewer.institution = non_empty(self.institution);
        Ok(reviewer)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn next_case(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let core = state.core();
    let case = blocking(move || Ok(core.next_validation_case()?)).await?;

    Ok(Json(match case {
        Some(case) => json!({"status": "success", "case": case}),
        None => json!({"status": "complete", "message": "No more cases available"}),
    }))
}

async fn submit_validation(
    State(state): State<AppState>,
    payload: Result<Json<SubmitValidation>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let validation = payload.into_validation()?;
    let case_id = validation.output_id;

    let core = state.core();
    let id = blocking(move || Ok(core.submit_validation(&validation)?)).await?;
    info!(case_id, validation_id = id, "Validation saved");

    Ok(Json(json!({
        "status": "success",
        "message": "Validation saved",
        "validation_id": id,
    })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<ValidationStats>> {
    let core = state.core();
    Ok(Json(blocking(move || Ok(core.validation_stats()?)).await?))
}

async fn list_reviewers(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let core = state.core();
    let reviewers = blocking(move || Ok(core.list_reviewers()?)).await?;
    Ok(Json(json!({"status": "success", "reviewers": reviewers})))
}

async fn get_reviewer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Reviewer>> {
    let core = state.core();
    let lookup = id.clone();
    blocking(move || Ok(core.get_reviewer(&lookup)?))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("reviewer {id}")))
}

async fn register_reviewer(
    State(state): State<AppState>,
    payload: Result<Json<RegisterReviewer>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let reviewer = payload.into_reviewer()?;
    let reviewer_id = reviewer.id.clone();

    let core = state.core();
    blocking(move || Ok(core.register_reviewer(&reviewer)?)).await?;
    info!(reviewer_id = %reviewer_id, "Reviewer registered");

    Ok(Json(json!({"status": "success", "reviewer_id": reviewer_id})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> SubmitValidation {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_submission_uses_demo_reviewer() {
        let validation = payload(r#"{"case_id": 3, "is_correct": true}"#)
            .into_validation()
            .unwrap();
        assert_eq!(validation.output_id, 3);
        assert_eq!(validation.reviewer_id, DEMO_REVIEWER_ID);
        assert_eq!(validation.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(validation.comments, None);
    }

    #[test]
    fn test_full_submission() {
        let validation = payload(
            r#"{
                "case_id": 9,
                "is_correct": false,
                "neurologist_id": "dr_lee",
                "neurologist_name": "Dr Lee",
                "confidence_level": "HIGH",
                "preferred_classification": "Vestibular migraine",
                "preferred_medication": "",
                "classification_correct": false,
                "review_time_seconds": 95
            }"#,
        )
        .into_validation()
        .unwrap();

        assert_eq!(validation.reviewer_id, "dr_lee");
        assert_eq!(validation.reviewer_name.as_deref(), Some("Dr Lee"));
        assert_eq!(validation.confidence_level, ConfidenceLevel::High);
        assert_eq!(validation.preferred_classification.as_deref(), Some("Vestibular migraine"));
        assert_eq!(validation.preferred_medication, None);
        assert_eq!(validation.classification_correct, Some(false));
        assert_eq!(validation.review_time_seconds, 95);
    }

    #[test]
    fn test_reviewer_registration_fields() {
        let reviewer: RegisterReviewer = serde_json::from_str(
            r#"{"email": " ng@example.org ", "name": "Dr Ng", "subspecialties": ["stroke", " "], "institution": ""}"#,
        )
        .unwrap();
        let reviewer = reviewer.into_reviewer().unwrap();
        assert_eq!(reviewer.email, "ng@example.org");
        assert_eq!(reviewer.subspecialties, vec!["stroke"]);
        assert_eq!(reviewer.institution, None);
        assert_eq!(reviewer.id.len(), 36);
    }

    #[test]
    fn test_reviewer_registration_requires_email() {
        let reviewer: RegisterReviewer =
            serde_json::from_str(r#"{"email": "nobody", "name": "Dr Ng"}"#).unwrap();
        assert!(matches!(reviewer.into_reviewer(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_bad_confidence_level() {
        let err = payload(r#"{"case_id": 1, "is_correct": true, "confidence_level": "certain"}"#)
            .into_validation()
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
