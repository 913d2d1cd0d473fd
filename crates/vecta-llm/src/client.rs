//! Text generation against a hosted model.
//!
//! The service never runs the model itself. It talks to a
//! text-generation-inference style HTTP endpoint:
//!
//! - `POST {base}/generate` with `{"inputs": ..., "parameters": {...}}`
//! - `GET {base}/info` for the served model id

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Generation errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Model endpoint not reachable at {0}")]
    Connection(String),

    #[error("Model request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model endpoint returned an error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub do_sample: bool,
    /// Input is cut to this many tokens by the server.
    pub truncate: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.3,
            top_p: 0.85,
            repetition_penalty: 1.05,
            do_sample: true,
            truncate: 3200,
        }
    }
}

/// A completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Prompt tokens, when the endpoint reports them.
    pub input_tokens: Option<u32>,
    pub generated_tokens: u32,
}

/// What the endpoint says it is serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    #[serde(default)]
    pub max_total_tokens: Option<u32>,
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> GenerationResult<Generation>;

    async fn model_info(&self) -> GenerationResult<ModelInfo>;
}

// =========================================================================
// HTTP client
// =========================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: RequestParameters<'a>,
}

#[derive(Serialize)]
struct RequestParameters<'a> {
    #[serde(flatten)]
    sampling: &'a GenerationParams,
    details: bool,
    decoder_input_details: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: String,
    #[serde(default)]
    details: Option<GenerateDetails>,
}

#[derive(Deserialize)]
struct GenerateDetails {
    generated_tokens: u32,
    #[serde(default)]
    prefill: Vec<serde_json::Value>,
}

/// Client for a text-generation-inference style endpoint.
pub struct HttpTextGenerator {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpTextGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> GenerationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            GenerationError::Connection(self.base_url.clone())
        } else {
            GenerationError::Http(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> GenerationResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GenerationError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> GenerationResult<Generation> {
        let url = format!("{}/generate", self.base_url);
        let body = GenerateRequest {
            inputs: prompt,
            parameters: RequestParameters {
                sampling: params,
                details: true,
                decoder_input_details: true,
            },
        };

        debug!(url = %url, prompt_chars = prompt.len(), "Sending generation request");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let (generated_tokens, input_tokens) = match parsed.details {
            Some(details) => {
                let prefill = u32::try_from(details.prefill.len()).ok().filter(|n| *n > 0);
                (details.generated_tokens, prefill)
            }
            None => (0, None),
        };

        Ok(Generation {
            text: parsed.generated_text.trim().to_string(),
            input_tokens,
            generated_tokens,
        })
    }

    async fn model_info(&self) -> GenerationResult<ModelInfo> {
        let url = format!("{}/info", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))
    }
}

// =========================================================================
// Mock
// =========================================================================

/// Mock generator for testing. Returns a fixed response and records prompts.
pub struct MockTextGenerator {
    response: String,
    generated_tokens: u32,
    model_id: String,
    fail: bool,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            generated_tokens: response.split_whitespace().count() as u32,
            model_id: "mock-model".to_string(),
            fail: false,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails as unreachable.
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn with_generated_tokens(mut self, tokens: u32) -> Self {
        self.generated_tokens = tokens;
        self
    }

    /// Answer every call only after `delay`, like a busy model server.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> GenerationResult<Generation> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.wait().await;
        if self.fail {
            return Err(GenerationError::Connection("mock".to_string()));
        }
        Ok(Generation {
            text: self.response.clone(),
            input_tokens: Some(prompt.split_whitespace().count() as u32),
            generated_tokens: self.generated_tokens,
        })
    }

    async fn model_info(&self) -> GenerationResult<ModelInfo> {
        self.wait().await;
        if self.fail {
            return Err(GenerationError::Connection("mock".to_string()));
        }
        Ok(ModelInfo {
            model_id: self.model_id.clone(),
            max_input_tokens: Some(3200),
            max_total_tokens: Some(4096),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 512);
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.top_p, 0.85);
        assert_eq!(params.repetition_penalty, 1.05);
        assert!(params.do_sample);
        assert_eq!(params.truncate, 3200);
    }

    #[test]
    fn test_request_body_shape() {
        let params = GenerationParams::default();
        let body = GenerateRequest {
            inputs: "hello",
            parameters: RequestParameters {
                sampling: &params,
                details: true,
                decoder_input_details: true,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inputs"], "hello");
        assert_eq!(json["parameters"]["max_new_tokens"], 512);
        assert_eq!(json["parameters"]["truncate"], 3200);
        assert_eq!(json["parameters"]["details"], true);
    }

    #[test]
    fn test_constructor_trims_trailing_slash() {
        let client = HttpTextGenerator::new("http://localhost:8080/", Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockTextGenerator::new("three word reply").with_generated_tokens(42);
        let generation = mock.generate("prompt one", &GenerationParams::default()).await.unwrap();
        assert_eq!(generation.text, "three word reply");
        assert_eq!(generation.generated_tokens, 42);
        assert_eq!(mock.prompts(), vec!["prompt one".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_mock() {
        let mock = MockTextGenerator::unreachable();
        assert!(matches!(
            mock.model_info().await,
            Err(GenerationError::Connection(_))
        ));
    }
}
