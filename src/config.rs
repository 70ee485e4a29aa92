use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Settings read once when a pipeline is built.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// endpoint = "http://localhost:11434/api/generate"
/// model = "py3"
/// quiet_window_ms = 500
/// deadline_ms = 2000
/// min_prompt_chars = 20
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Full URL of the generate endpoint.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Idle gap that must pass before a pending prompt is dispatched.
    pub quiet_window_ms: u64,
    /// Hard budget for one generation request.
    pub deadline_ms: u64,
    /// Minimum raw input length, in characters, before the gate submits.
    pub min_prompt_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".into(),
            model: "py3".into(),
            quiet_window_ms: 500,
            deadline_ms: 2000,
            min_prompt_chars: 20,
        }
    }
}

impl PipelineConfig {
    /// Creates a config for `endpoint` and `model` with default timings.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn quiet_window_ms(mut self, ms: u64) -> Self {
        self.quiet_window_ms = ms;
        self
    }

    pub fn deadline_ms(mut self, ms: u64) -> Self {
        self.deadline_ms = ms;
        self
    }

    pub fn min_prompt_chars(mut self, chars: usize) -> Self {
        self.min_prompt_chars = chars;
        self
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Parses and validates a config from TOML text.
    ///
    /// ```
    /// use llm_pipeline::PipelineConfig;
    /// let cfg = PipelineConfig::from_toml_str("model = \"qwen\"\ndeadline_ms = 800").unwrap();
    /// assert_eq!(cfg.model, "qwen");
    /// assert_eq!(cfg.quiet_window_ms, 500);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a config from a TOML file.
    ///
    /// ```no_run
    /// use llm_pipeline::PipelineConfig;
    /// # tokio_test::block_on(async {
    /// let cfg = PipelineConfig::load("llm.toml").await.unwrap();
    /// assert!(!cfg.model.is_empty());
    /// # });
    /// ```
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    /// Checks that the settings can drive a pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint {:?}: {e}", self.endpoint)))?;
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.deadline_ms == 0 {
            return Err(ConfigError::Invalid("deadline_ms must be positive".into()));
        }
        if self.quiet_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "quiet_window_ms must be positive".into(),
            ));
        }
        if self.min_prompt_chars == 0 {
            return Err(ConfigError::Invalid(
                "min_prompt_chars must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
