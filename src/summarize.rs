//! Summarization collaborator: a hosted chat-completions model.
//!
//! The engine only supplies a context string and a prompt and forwards the
//! model's answer verbatim. Summarization is optional: when no credential
//! is configured, [`MistralSummarizer::from_config`] returns `None` and
//! similarity search keeps working without it.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::SummarizerConfig;
use crate::error::{Result, RetrievalError};

/// A text-completion collaborator over a ranked-results context.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Answer `prompt` given `context`; output is forwarded verbatim.
    async fn complete(&self, context: &str, prompt: &str) -> Result<String>;
}

/// Summarizer backed by a Mistral-compatible chat-completions endpoint.
///
/// The ranked-results context rides in the system message, the user's
/// question in the user message.
pub struct MistralSummarizer {
    model: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl MistralSummarizer {
    /// Build the summarizer if a credential is present in the configured
    /// environment variable; `None` otherwise.
    pub fn from_config(config: &SummarizerConfig) -> Result<Option<Self>> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            api_key,
            client,
        }))
    }
}

#[async_trait]
impl Summarizer for MistralSummarizer {
    async fn complete(&self, context: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": context },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Network(format!(
                "summarizer endpoint error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::Parse(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RetrievalError::Parse("summarizer response missing choices[0].message.content".into())
            })
    }
}
