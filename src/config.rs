//! Run configuration.
//!
//! Loaded once at startup from a JSON file (every field optional) and
//! shared read-only for the whole run.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ExtractionMode;

/// Environment variable consulted for the model API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelSettings,
    pub extraction: ExtractionSettings,
    pub batch: BatchSettings,
    pub prompts: PromptSettings,
}

/// Generative model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub api_key: String,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: "gemini-1.5-flash".to_string(),
            temperature: 0.3,
            max_tokens: 8192,
            request_timeout_secs: 120,
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl ModelSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Structural extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Spans at or above this font size are headers
    pub header_font_size_threshold: f32,
    /// Spans whose top edge is at or below this y are footnote candidates
    pub footnote_position_threshold: f32,
    pub table_extraction_enabled: bool,
    pub default_mode: ExtractionMode,
    /// Collect and classify pages in parallel
    pub parallel: bool,
    /// Character budget for the prompt
    pub max_prompt_chars: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            header_font_size_threshold: 14.0,
            footnote_position_threshold: 700.0,
            table_extraction_enabled: true,
            default_mode: ExtractionMode::Standard,
            parallel: true,
            max_prompt_chars: 30_000,
        }
    }
}

/// Batch concurrency limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Documents processed at once
    pub max_workers: usize,
    /// Model calls in flight at once, across all documents
    pub max_concurrent_model_calls: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_concurrent_model_calls: 2,
        }
    }
}

/// Prompt overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Replaces the built-in standard-mode instruction block
    pub standard_instructions: Option<String>,
    /// Replaces the built-in detailed-mode instruction block
    pub detailed_instructions: Option<String>,
    /// Category description overrides, keyed by category key or label
    pub categories: BTreeMap<String, String>,
}

impl Config {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let ex = &self.extraction;
        if ex.header_font_size_threshold <= 0.0 {
            return Err(Error::Config(
                "header_font_size_threshold must be positive".to_string(),
            ));
        }
        if ex.footnote_position_threshold <= 0.0 {
            return Err(Error::Config(
                "footnote_position_threshold must be positive".to_string(),
            ));
        }
        if ex.max_prompt_chars < 1000 {
            return Err(Error::Config(
                "max_prompt_chars must be at least 1000".to_string(),
            ));
        }

        let model = &self.model;
        if !(0.0..=2.0).contains(&model.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside [0, 2]",
                model.temperature
            )));
        }
        if model.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be at least 1".to_string()));
        }
        if model.model_name.trim().is_empty() {
            return Err(Error::Config("model_name must not be empty".to_string()));
        }
        if model.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.batch.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.batch.max_concurrent_model_calls == 0 {
            return Err(Error::Config(
                "max_concurrent_model_calls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.model.api_key = key.into();
        self
    }

    /// Fill the API key from the environment when none is configured.
    pub fn with_api_key_from_env(mut self) -> Self {
        if self.model.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                self.model.api_key = key;
            }
        }
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.model.model_name = name.into();
        self
    }

    /// Set the default extraction mode.
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.extraction.default_mode = mode;
        self
    }

    /// Set the header font size threshold.
    pub fn with_header_threshold(mut self, size: f32) -> Self {
        self.extraction.header_font_size_threshold = size;
        self
    }

    /// Set the footnote position threshold.
    pub fn with_footnote_threshold(mut self, y: f32) -> Self {
        self.extraction.footnote_position_threshold = y;
        self
    }

    /// Enable or disable table detection.
    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.extraction.table_extraction_enabled = enabled;
        self
    }

    /// Enable or disable per-page parallelism.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.extraction.parallel = parallel;
        self
    }

    /// Disable per-page parallelism.
    pub fn sequential(mut self) -> Self {
        self.extraction.parallel = false;
        self
    }

    /// Set the number of documents processed at once.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.batch.max_workers = workers;
        self
    }

    /// Set the number of concurrent model calls.
    pub fn with_model_concurrency(mut self, calls: usize) -> Self {
        self.batch.max_concurrent_model_calls = calls;
        self
    }

    /// Set the model-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.model.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the retry count for failed model calls.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.model.max_retries = retries;
        self
    }
}
