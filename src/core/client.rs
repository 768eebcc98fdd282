//! Remote translation client for the DeepSeek chat completions API

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};

/// System prompt fixing the single supported target language.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that translates English to French \
                             while maintaining the original meaning and style.";

/// The remote translation boundary: source text in, translated text out.
///
/// A failure is returned as an error and never aborts the whole run; the
/// dispatcher converts it into a diagnostic string for the affected
/// paragraph. Concurrency is the dispatcher's job, so implementations only
/// handle one call at a time.
#[async_trait]
pub trait Translate: Send + Sync {
    /// Translate one paragraph.
    async fn translate(&self, text: &str) -> Result<String>;
}

/// DeepSeek-backed translator
#[derive(Debug, Clone)]
pub struct DeepSeekTranslator {
    client: reqwest::Client,
    config: Arc<TranslatorConfig>,
}

impl DeepSeekTranslator {
    /// Create a new translator from a validated config
    pub fn new(config: TranslatorConfig) -> Result<Self> {
        config.validate()?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        let config = TranslatorConfig::load()?;
        Self::new(config)
    }

    /// Send the HTTP request and extract the translated text
    async fn send_request(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Translate this into French:\n{}", text) }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_output_tokens,
        });

        let response = self
            .client
            .post(&self.config.api_endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslationError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| TranslationError::InvalidResponseError {
                    message: e.to_string(),
                })?;

            let translation = json["choices"]
                .get(0)
                .and_then(|c| c["message"]["content"].as_str())
                .ok_or_else(|| TranslationError::InvalidResponseError {
                    message: "No translation in response".to_string(),
                })?
                .trim()
                .to_string();

            debug!("Translated {} chars -> {} chars", text.len(), translation.len());
            Ok(translation)
        } else {
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();
            Err(TranslationError::ApiError {
                status: status_code,
                message: error_text,
            })
        }
    }
}

#[async_trait]
impl Translate for DeepSeekTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        self.send_request(text).await
    }
}
