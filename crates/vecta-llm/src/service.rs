//! The analysis pipeline.
//!
//! ```text
//! request ──▶ gate ──▶ system prompt ──▶ truncate ──▶ detect condition
//!                                                          │
//!        result ◀── bullets ◀── tabular ◀── generate ◀── context + prompt
//! ```
//!
//! Each request holds a gate slot for its whole lifetime. The slot is freed
//! when the request finishes, whether it succeeded or not.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use vecta_core::models::{AiOutput, AnalysisType, Condition, Specialty};
use vecta_core::sanitize::{hash_user_identifier, sanitize_medical_text};
use vecta_core::{CoreError, VectaCore};

use crate::client::{GenerationError, GenerationParams, ModelInfo, TextGenerator};
use crate::extraction::{extract_structured_bullets, parse_bullet_fields};
use crate::gate::{AdmissionGate, GateError};
use crate::prompts::{build_prompt, system_prompt, truncate_medical_text, PromptParts, MAX_TEXT_CHARS};
use crate::tabular::{TabularData, TabularOutput};

/// Responses shorter than this many tokens get a validation note.
pub const MIN_USEFUL_TOKENS: u32 = 30;

/// Few-shot examples injected per prompt.
pub const FEW_SHOT_EXAMPLES: usize = 2;

/// Model version recorded with outputs sent for review.
pub const REVIEW_MODEL_VERSION: &str = "2.0-enhanced";

pub const PROMPT_VERSION: &str = "Vecta-AI-Enhanced";

const SHORT_RESPONSE_NOTE: &str =
    "Vecta AI validation: Very short response - consider more specific medical context";

/// Characters of input shown in debug logs.
const LOG_PREVIEW_CHARS: usize = 120;

/// Analysis errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("No text content provided for Vecta AI analysis")]
    EmptyText,

    #[error("Model call failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Context error: {0}")]
    Context(#[from] CoreError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Settings the pipeline runs with.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub model_name: String,
    pub max_concurrent: usize,
    pub enqueue_timeout: Duration,
    pub max_text_chars: usize,
    pub few_shot_examples: usize,
    pub params: GenerationParams,
    pub phi_filtering: bool,
    /// Bound on the model-info call made by [`AnalysisService::health`].
    pub health_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            model_name: "m42-health/Llama3-Med42-8B".to_string(),
            max_concurrent: 10,
            enqueue_timeout: Duration::from_secs(1),
            max_text_chars: MAX_TEXT_CHARS,
            few_shot_examples: FEW_SHOT_EXAMPLES,
            params: GenerationParams::default(),
            phi_filtering: true,
            health_timeout: Duration::from_secs(5),
        }
    }
}

/// One analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// The caller's instruction.
    pub prompt: String,
    /// Clinical text as submitted, or the dataset summary for an uploaded table.
    pub text: String,
    pub analysis_type: AnalysisType,
    pub specialty: Option<Specialty>,
    pub user_id: Option<String>,
    pub tabular: Option<TabularData>,
}

/// A completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub request_id: String,
    pub analysis: String,
    /// Seconds
    pub execution_time: f64,
    pub tokens_generated: u32,
    pub input_tokens: Option<u32>,
    /// Character count before truncation
    pub text_length_original: usize,
    pub model_used: String,
    pub prompt_version: String,
    pub timestamp: String,
    pub is_tabular: bool,
    pub validation_notes: String,
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabular_output: Option<TabularOutput>,
}

impl AnalysisOutcome {
    /// Build the row stored for expert review.
    pub fn review_output(&self, request: &AnalysisRequest) -> AiOutput {
        let mut output = AiOutput::new(
            &request.text,
            Some(request.specialty.map_or("neurology", |s| s.as_str())),
        )
        .with_bullets(&parse_bullet_fields(&self.analysis));
        output.input_type = Some(request.analysis_type.as_str().to_string());
        output.condition = self.condition.map(|c| c.as_str().to_string());
        output.ai_full_response = Some(self.analysis.clone());
        output.model_version = Some(REVIEW_MODEL_VERSION.to_string());
        output.prompt_version = Some(self.prompt_version.clone());
        output.processing_time_ms = Some((self.execution_time * 1000.0).round() as i64);
        output.session_id = request.user_id.as_deref().map(hash_user_identifier);
        output
    }
}

/// Running request counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub requests: u64,
    pub successes: u64,
    /// Running mean, seconds
    pub avg_time: f64,
    pub last_request: Option<String>,
}

impl ServiceStats {
    fn record(&mut self, elapsed: Duration, success: bool) {
        self.requests += 1;
        if success {
            self.successes += 1;
        }
        let n = self.requests as f64;
        self.avg_time = ((n - 1.0) * self.avg_time + elapsed.as_secs_f64()) / n;
        self.last_request = Some(chrono::Local::now().to_rfc3339());
    }
}

/// Service health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub load_error: Option<String>,
    pub model_name: String,
    pub model_info: Option<ModelInfo>,
    pub prompt_engine: String,
    pub stats: ServiceStats,
    pub queue_size: usize,
    pub max_concurrent: usize,
    pub timestamp: String,
}

/// Runs analyses against a text generator with shared context sources.
pub struct AnalysisService {
    gate: AdmissionGate,
    generator: Arc<dyn TextGenerator>,
    core: Arc<VectaCore>,
    settings: ServiceSettings,
    stats: Mutex<ServiceStats>,
}

impl AnalysisService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        core: Arc<VectaCore>,
        settings: ServiceSettings,
    ) -> Self {
        let gate = AdmissionGate::new(settings.max_concurrent, settings.enqueue_timeout);
        Self {
            gate,
            generator,
            core,
            settings,
            stats: Mutex::new(ServiceStats::default()),
        }
    }

    pub fn core(&self) -> &Arc<VectaCore> {
        &self.core
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one analysis end to end.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<AnalysisOutcome> {
        let request_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let started = Instant::now();

        let outcome = self.run(&request_id, request, started).await;

        let elapsed = started.elapsed();
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed, outcome.is_ok());

        if let Err(e) = &outcome {
            error!(request_id = %request_id, error = %e, "Vecta AI analysis failed");
        }
        outcome
    }

    async fn run(
        &self,
        request_id: &str,
        request: &AnalysisRequest,
        started: Instant,
    ) -> AnalysisResult<AnalysisOutcome> {
        let _permit = self.gate.admit().await?;

        let analysis_type = request.analysis_type;
        let is_tabular = request.tabular.is_some();
        info!(
            request_id,
            analysis_type = %analysis_type,
            text_chars = request.text.len(),
            is_tabular,
            "Vecta AI analysis started"
        );

        if request.text.trim().is_empty() {
            return Err(AnalysisError::EmptyText);
        }
        debug!(
            request_id,
            preview = %sanitize_medical_text(
                &request.text.chars().take(LOG_PREVIEW_CHARS).collect::<String>(),
                self.settings.phi_filtering,
            ),
            "Input preview"
        );

        let system = system_prompt(analysis_type, is_tabular, request.specialty);

        let text_length_original = request.text.chars().count();
        let text = truncate_medical_text(&request.text, self.settings.max_text_chars);
        if text.len() != request.text.len() {
            info!(request_id, chars = text.chars().count(), "Text truncated");
        }

        let condition = Condition::detect(&text, request.specialty);
        let context = self.core.enhanced_context(
            condition,
            analysis_type,
            self.settings.few_shot_examples,
            Some(text.as_ref()),
        )?;
        if let Some(c) = condition {
            info!(request_id, condition = %c.as_str(), "Enhanced with few-shot examples");
        }

        let prompt = build_prompt(&PromptParts {
            analysis_type,
            system_prompt: &system,
            user_prompt: &request.prompt,
            medical_data: &text,
            context: &context,
            tabular: is_tabular,
        });
        info!(request_id, prompt_chars = prompt.len(), "Prompt constructed");

        let generation = self.generator.generate(&prompt, &self.settings.params).await?;
        info!(
            request_id,
            tokens = generation.generated_tokens,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Response generated"
        );

        let tabular_output = match &request.tabular {
            Some(table) => match table.augment(analysis_type) {
                Ok(output) => Some(output),
                Err(e) => {
                    error!(request_id, error = %e, "Tabular output generation failed");
                    None
                }
            },
            None => None,
        };

        let analysis = if analysis_type.supports_bullets() {
            extract_structured_bullets(&generation.text, analysis_type)
        } else {
            generation.text
        };

        let validation_notes = if generation.generated_tokens < MIN_USEFUL_TOKENS {
            warn!(request_id, tokens = generation.generated_tokens, "Very short response");
            SHORT_RESPONSE_NOTE.to_string()
        } else {
            String::new()
        };

        Ok(AnalysisOutcome {
            request_id: request_id.to_string(),
            analysis,
            execution_time: started.elapsed().as_secs_f64(),
            tokens_generated: generation.generated_tokens,
            input_tokens: generation.input_tokens,
            text_length_original,
            model_used: format!("{}-Optimized", self.settings.model_name),
            prompt_version: PROMPT_VERSION.to_string(),
            timestamp: chrono::Local::now().to_rfc3339(),
            is_tabular,
            validation_notes,
            condition,
            tabular_output,
        })
    }

    /// Gate occupancy, counters and whether the model endpoint answers
    /// within the health timeout.
    pub async fn health(&self) -> HealthReport {
        let limit = self.settings.health_timeout;
        let (model_info, load_error) =
            match tokio::time::timeout(limit, self.generator.model_info()).await {
                Ok(Ok(info)) => (Some(info), None),
                Ok(Err(e)) => (None, Some(e.to_string())),
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Model info timed out");
                    (
                        None,
                        Some(format!("Model endpoint did not answer within {}ms", limit.as_millis())),
                    )
                }
            };
        let model_loaded = model_info.is_some();

        HealthReport {
            status: if model_loaded { "healthy" } else { "loading" }.to_string(),
            model_loaded,
            load_error,
            model_name: self.settings.model_name.clone(),
            model_info,
            prompt_engine: "Vecta-AI-Optimized".to_string(),
            stats: self.stats(),
            queue_size: self.gate.in_flight(),
            max_concurrent: self.gate.capacity(),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}
