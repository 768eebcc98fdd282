//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Configuration for the translation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// DeepSeek API key
    pub api_key: String,
    /// Chat completions endpoint
    pub api_endpoint: String,
    /// Model identifier
    pub model: String,
    /// Paragraphs dispatched concurrently per batch
    pub max_concurrent: usize,
    /// Per-request HTTP timeout
    pub timeout_ms: u64,
    /// Completion token cap per paragraph
    pub max_output_tokens: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Directory holding per-book cache files
    pub cache_dir: PathBuf,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("DEEPSEEK_API_KEY").unwrap_or_default(),
            api_endpoint: std::env::var("API_ENDPOINT")
                .unwrap_or_else(|_| "https://api.deepseek.com/chat/completions".to_string()),
            model: "deepseek-chat".to_string(),
            max_concurrent: 4,
            timeout_ms: 30000,
            max_output_tokens: 1024,
            temperature: 0.5,
            cache_dir: PathBuf::from(".translation_cache"),
        }
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .map_err(|_| anyhow::anyhow!("DEEPSEEK_API_KEY environment variable is required"))?;

        let api_endpoint = std::env::var("API_ENDPOINT")
            .unwrap_or_else(|_| "https://api.deepseek.com/chat/completions".to_string());

        let model = std::env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());

        let max_concurrent = std::env::var("MAX_CONCURRENT")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<usize>()?;

        let timeout_ms = std::env::var("REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse::<u64>()?;

        let max_output_tokens = std::env::var("MAX_OUTPUT_TOKENS")
            .unwrap_or_else(|_| "1024".to_string())
            .parse::<usize>()?;

        let temperature = std::env::var("TEMPERATURE")
            .unwrap_or_else(|_| "0.5".to_string())
            .parse::<f64>()?;

        let cache_dir = std::env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".translation_cache"));

        Ok(Self {
            api_key,
            api_endpoint,
            model,
            max_concurrent,
            timeout_ms,
            max_output_tokens,
            temperature,
            cache_dir,
        })
    }

    /// Load configuration and log the effective settings
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::from_env()?;
        info!(
            "Loaded config: model={}, max_concurrent={}, cache_dir={}",
            config.model,
            config.max_concurrent,
            config.cache_dir.display()
        );
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow::anyhow!("API key is required"));
        }

        if self.api_endpoint.is_empty() {
            return Err(anyhow::anyhow!("API endpoint is required"));
        }

        if self.max_concurrent == 0 {
            return Err(anyhow::anyhow!("max_concurrent must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("temperature must be between 0 and 2"));
        }

        Ok(())
    }
}
