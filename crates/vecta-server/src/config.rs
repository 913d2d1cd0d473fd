//! Service configuration.
//!
//! Values come from defaults, then an optional TOML file, then `VECTA_*`
//! environment variables. The result is validated before the server starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;
use vecta_llm::{GenerationParams, ServiceSettings, MAX_TEXT_CHARS, FEW_SHOT_EXAMPLES};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: String, value: String },

    #[error("Invalid configuration for {field} ('{value}'): {reason}")]
    Invalid {
        field: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// How the background learner decides to run a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
    /// Every `interval_minutes`, if correct validations grew.
    #[default]
    Interval,
    /// Every `threshold_check_secs`, once `threshold` new correct validations exist.
    Threshold,
}

/// Background learning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSchedule {
    pub enabled: bool,
    pub mode: LearningMode,
    pub interval_minutes: u64,
    pub threshold: i64,
    pub threshold_check_secs: u64,
}

impl Default for LearningSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: LearningMode::Interval,
            interval_minutes: 60,
            threshold: 5,
            threshold_check_secs: 300,
        }
    }
}

impl LearningSchedule {
    /// Time between checks for the configured mode.
    pub fn period(&self) -> Duration {
        match self.mode {
            LearningMode::Interval => Duration::from_secs(self.interval_minutes * 60),
            LearningMode::Threshold => Duration::from_secs(self.threshold_check_secs),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_host: String,
    pub service_port: u16,
    /// Last port tried when the configured one is taken
    pub port_range_end: u16,
    pub max_concurrent_users: usize,
    pub enqueue_timeout_ms: u64,

    pub model_name: String,
    /// Base URL of the text-generation endpoint
    pub model_endpoint: String,
    pub request_timeout_secs: u64,
    /// Bound on the model-info call made by `/health`
    pub health_timeout_secs: u64,

    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Fraction of successful analyses stored for expert review
    pub sample_rate: f64,

    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,

    pub enable_phi_filtering: bool,
    pub log_level: String,
    pub log_format: LogFormat,

    pub learning: LearningSchedule,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_host: "0.0.0.0".to_string(),
            service_port: 8085,
            port_range_end: 8150,
            max_concurrent_users: 10,
            enqueue_timeout_ms: 1000,
            model_name: "m42-health/Llama3-Med42-8B".to_string(),
            model_endpoint: "http://localhost:8080".to_string(),
            request_timeout_secs: 300,
            health_timeout_secs: 5,
            data_dir: PathBuf::from("data"),
            db_path: PathBuf::from("data/validation.db"),
            sample_rate: 0.10,
            max_upload_bytes: 50 * 1024 * 1024,
            allowed_extensions: ["txt", "pdf", "docx", "xlsx", "xls", "csv", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            enable_phi_filtering: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            learning: LearningSchedule::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults, overlaid by `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `VECTA_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VECTA_SERVICE_HOST") {
            self.service_host = v;
        }
        if let Some(v) = lookup("VECTA_SERVICE_PORT") {
            self.service_port = parse_env("VECTA_SERVICE_PORT", &v)?;
        }
        if let Some(v) = lookup("VECTA_MAX_CONCURRENT_USERS") {
            self.max_concurrent_users = parse_env("VECTA_MAX_CONCURRENT_USERS", &v)?;
        }
        if let Some(v) = lookup("VECTA_MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = lookup("VECTA_MODEL_ENDPOINT") {
            self.model_endpoint = v;
        }
        if let Some(v) = lookup("VECTA_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VECTA_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VECTA_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("VECTA_SAMPLE_RATE") {
            self.sample_rate = parse_env("VECTA_SAMPLE_RATE", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_url("model_endpoint", &self.model_endpoint)?;
        validate_path("data_dir", &self.data_dir)?;
        validate_path("db_path", &self.db_path)?;

        if self.max_concurrent_users == 0 {
            return Err(invalid("max_concurrent_users", "0", "must be at least 1"));
        }
        if self.max_concurrent_users > Semaphore::MAX_PERMITS {
            return Err(invalid(
                "max_concurrent_users",
                &self.max_concurrent_users.to_string(),
                &format!("must be at most {}", Semaphore::MAX_PERMITS),
            ));
        }
        if self.health_timeout_secs == 0 {
            return Err(invalid("health_timeout_secs", "0", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(invalid(
                "sample_rate",
                &self.sample_rate.to_string(),
                "must be between 0 and 1",
            ));
        }
        if self.port_range_end < self.service_port {
            return Err(invalid(
                "port_range_end",
                &self.port_range_end.to_string(),
                "must not be below service_port",
            ));
        }
        if self.learning.enabled && self.learning.period().is_zero() {
            return Err(invalid("learning", "0", "check period must be positive"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Pipeline settings derived from this configuration.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            model_name: self.model_name.clone(),
            max_concurrent: self.max_concurrent_users,
            enqueue_timeout: Duration::from_millis(self.enqueue_timeout_ms),
            max_text_chars: MAX_TEXT_CHARS,
            few_shot_examples: FEW_SHOT_EXAMPLES,
            params: GenerationParams::default(),
            phi_filtering: self.enable_phi_filtering,
            health_timeout: Duration::from_secs(self.health_timeout_secs),
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_url(field: &str, value: &str) -> ConfigResult<()> {
    match Url::parse(value) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(field, value, &format!("unsupported URL scheme: {scheme}"))),
        },
        Err(e) => Err(invalid(field, value, &format!("invalid URL: {e}"))),
    }
}

fn validate_path(field: &str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(invalid(field, "", "path cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service_port, 8085);
        assert_eq!(config.sample_rate, 0.10);
        assert!(crate::upload::check_extension("labs.CSV", &config.allowed_extensions).is_ok());
        assert!(crate::upload::check_extension("setup.exe", &config.allowed_extensions).is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            service_port = 9000
            port_range_end = 9010
            model_endpoint = "https://tgi.internal:8443"
            log_format = "json"

            [learning]
            mode = "threshold"
            threshold = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.service_port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.learning.mode, LearningMode::Threshold);
        assert_eq!(config.learning.threshold, 3);
        assert_eq!(config.learning.period(), Duration::from_secs(300));
        assert_eq!(config.max_concurrent_users, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let config =
            ServiceConfig::from_toml_str(include_str!("../../../vecta.example.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VECTA_SERVICE_PORT", "8100"),
            ("VECTA_SAMPLE_RATE", "0.5"),
            ("VECTA_MODEL_NAME", "local-med"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.service_port, 8100);
        assert_eq!(config.sample_rate, 0.5);
        assert_eq!(config.model_name, "local-med");
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(|k| (k == "VECTA_SERVICE_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ServiceConfig {
            model_endpoint: "ftp://models".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.model_endpoint = "http://localhost:8080".to_string();
        config.sample_rate = 1.5;
        assert!(config.validate().is_err());

        config.sample_rate = 0.1;
        config.max_concurrent_users = 0;
        assert!(config.validate().is_err());

        config.max_concurrent_users = 4;
        config.port_range_end = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_above_semaphore_limit_rejected() {
        let mut config = ServiceConfig {
            max_concurrent_users: Semaphore::MAX_PERMITS + 1,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "max_concurrent_users"));

        config.max_concurrent_users = Semaphore::MAX_PERMITS;
        assert!(config.validate().is_ok());

        config.health_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_health_timeout_reaches_settings() {
        let config = ServiceConfig {
            health_timeout_secs: 2,
            ..Default::default()
        };
        assert_eq!(config.service_settings().health_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vecta.toml");
        std::fs::write(&path, "max_concurrent_users = 3\n").unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.max_concurrent_users, 3);
        assert_eq!(config.service_settings().max_concurrent, 3);

        assert!(matches!(
            ServiceConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
