use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::refine::error::RefineError;

/// Unified configuration for the ctxloop CLI tools
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CtxloopConfig {
    /// Configuration for the refine command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refine: Option<RefineConfig>,
}

/// API mode used to reach the model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Chat Completions API, what most OpenAI-compatible servers (vLLM) expose
    #[default]
    Chat,
    /// Responses API
    Responses,
}

impl std::str::FromStr for ApiMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(ApiMode::Chat),
            "responses" => Ok(ApiMode::Responses),
            _ => Err(anyhow::anyhow!(
                "Invalid api_mode '{}'. Must be 'chat' or 'responses'",
                s
            )),
        }
    }
}

/// What a run does when one record cannot be processed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordErrorPolicy {
    /// Log the failure, leave the row's result columns empty and continue
    #[default]
    Skip,
    /// Stop the whole run at the first failed record
    Abort,
}

/// Configuration for the refine command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// API key (can also be set via OPENAI_API_KEY env var)
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint (defaults to OpenAI's API)
    pub base_url: Option<String>,

    /// Model name sent with every request
    pub model: Option<String>,

    /// API mode to use (chat or responses). Defaults to chat.
    #[serde(default)]
    pub api_mode: ApiMode,

    pub max_output_tokens: Option<u32>,

    pub temperature: Option<f32>,

    /// Maximum number of model calls per row
    pub max_iterations: Option<usize>,

    /// Number of references kept in play per edge
    pub k: Option<usize>,

    /// Seed for edge and reference selection. Unset means a fresh seed per run.
    pub seed: Option<u64>,

    /// Directory for the per-run text log
    pub log_dir: Option<String>,

    /// JSON-lines file holding the reference texts
    pub abstracts: Option<String>,

    #[serde(default)]
    pub on_record_error: RecordErrorPolicy,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: None,
            model: Some("gpt-4o-mini".to_string()),
            api_mode: ApiMode::default(),
            max_output_tokens: Some(2048),
            temperature: None,
            max_iterations: Some(5),
            k: Some(3),
            seed: None,
            log_dir: Some("./logs".to_string()),
            abstracts: None,
            on_record_error: RecordErrorPolicy::default(),
        }
    }
}

/// Loop bounds for a refinement run. Both must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineSettings {
    pub max_iterations: usize,
    pub k: usize,
}

impl RefineSettings {
    pub fn new(max_iterations: usize, k: usize) -> Result<Self, RefineError> {
        let settings = Self { max_iterations, k };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), RefineError> {
        if self.max_iterations == 0 {
            return Err(RefineError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.k == 0 {
            return Err(RefineError::InvalidConfig(
                "k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl CtxloopConfig {
    /// Load configuration from a file path
    /// If the file doesn't exist, returns default configuration
    pub fn from_config_file(path: &str) -> anyhow::Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: CtxloopConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Get the default config file path (~/.ctxloop_config.json)
    pub fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".ctxloop_config.json")
            .to_string_lossy()
            .to_string()
    }
}
