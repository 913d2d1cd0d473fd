//! `POST /analyze`: multipart form in, analysis JSON out.

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::Value;
use tracing::{info, warn};
use vecta_core::models::{AnalysisType, Specialty};
use vecta_core::sanitize::validate_medical_content;
use vecta_llm::{AnalysisOutcome, AnalysisRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::upload::{check_extension, extract_direct_text, extract_upload, ExtractedInput};

const ANONYMOUS_USER: &str = "anonymous";

/// Raw `/analyze` form fields.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeForm {
    pub prompt: String,
    pub analysis_type: String,
    pub specialty: String,
    pub direct_text: String,
    pub user_id: String,
    /// Filename and contents of a non-empty upload
    pub file: Option<(String, Vec<u8>)>,
}

/// A form that passed validation.
#[derive(Debug)]
struct ValidForm {
    prompt: String,
    analysis_type: AnalysisType,
    specialty: Option<Specialty>,
    user_id: String,
}

impl AnalyzeForm {
    pub async fn read(multipart: &mut Multipart) -> ApiResult<Self> {
        let mut form = AnalyzeForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if !filename.is_empty() {
                    form.file = Some((filename, bytes.to_vec()));
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            match name.as_str() {
                "prompt" => form.prompt = value,
                "analysisType" => form.analysis_type = value,
                "specialty" => form.specialty = value,
                "directText" => form.direct_text = value,
                "userId" => form.user_id = value,
                _ => {}
            }
        }
        Ok(form)
    }

    /// Collect every validation problem, joined with `; `.
    fn validate(&self, allowed_extensions: &[String]) -> ApiResult<ValidForm> {
        let mut errors = Vec::new();

        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            errors.push("Prompt is required".to_string());
        }

        let analysis_type = match self.analysis_type.parse::<AnalysisType>() {
            Ok(t) => Some(t),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let specialty = match Specialty::parse_optional(&self.specialty) {
            Ok(s) => s,
            Err(e) => {
                errors.push(e);
                None
            }
        };

        match &self.file {
            Some((filename, _)) => {
                if let Err(e) = check_extension(filename, allowed_extensions) {
                    errors.push(e.to_string());
                }
            }
            None if self.direct_text.trim().is_empty() => {
                errors.push("Either file upload or direct text input is required".to_string());
            }
            None => {}
        }

        match analysis_type {
            Some(analysis_type) if errors.is_empty() => Ok(ValidForm {
                prompt: prompt.to_string(),
                analysis_type,
                specialty,
                user_id: match self.user_id.trim() {
                    "" => ANONYMOUS_USER.to_string(),
                    id => id.to_string(),
                },
            }),
            _ => {
                let message = errors.join("; ");
                warn!(error = %message, "Request validation failed");
                Err(ApiError::BadRequest(message))
            }
        }
    }

    /// Uploaded file takes precedence over direct text.
    fn input(&self, allowed_extensions: &[String]) -> ApiResult<ExtractedInput> {
        match &self.file {
            Some((filename, bytes)) => extract_upload(filename, bytes, allowed_extensions)
                .map_err(|e| ApiError::BadRequest(e.to_string())),
            None => Ok(extract_direct_text(self.direct_text.trim())),
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = AnalyzeForm::read(&mut multipart).await?;
    let valid = form.validate(&state.config.allowed_extensions)?;
    let input = form.input(&state.config.allowed_extensions)?;

    info!(
        source = %input.source,
        chars = input.text.len(),
        is_tabular = input.tabular.is_some(),
        specialty = valid.specialty.map_or("general", |s| s.as_str()),
        "Analysis input received"
    );

    if input.text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No analyzable text found from {} for Vecta AI analysis",
            input.source
        )));
    }

    let content = validate_medical_content(&input.text);
    let request = AnalysisRequest {
        prompt: valid.prompt,
        text: input.text,
        analysis_type: valid.analysis_type,
        specialty: valid.specialty,
        user_id: Some(valid.user_id),
        tabular: input.tabular,
    };

    let outcome = state.service.analyze(&request).await?;
    info!(request_id = %outcome.request_id, "Analysis completed");

    if rand::random::<f64>() < state.config.sample_rate {
        sample_for_review(&state, &outcome, &request).await;
    }

    let mut body = serde_json::to_value(&outcome)
        .map_err(|e| ApiError::Internal(format!("response serialization: {e}")))?;
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
        map.insert("content_warnings".to_string(), content.warnings.into());
    }
    Ok(Json(body))
}

/// Store the outcome for expert review. Failures are logged, never returned.
async fn sample_for_review(state: &AppState, outcome: &AnalysisOutcome, request: &AnalysisRequest) {
    let output = outcome.review_output(request);
    let core = state.core();
    let request_id = outcome.request_id.clone();

    match tokio::task::spawn_blocking(move || core.record_output(&output)).await {
        Ok(Ok(id)) => info!(request_id = %request_id, output_id = id, "Sampled for expert review"),
        Ok(Err(e)) => warn!(request_id = %request_id, error = %e, "Could not store output for review"),
        Err(e) => warn!(request_id = %request_id, error = %e, "Review sampling task failed"),
    }
}
