//! Chat model client
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. The filled
//! prompt is sent as a single user message and the first choice's text is
//! returned as-is.

use crate::config::Settings;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for text generation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for a fully rendered prompt
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// LLM client configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    /// API base URL
    pub api_base: String,

    /// API key
    pub api_key: String,

    /// Model name
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI chat completions client
pub struct OpenAIChat {
    config: LLMConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// Create a new chat client
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let endpoint = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LlmError {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::LlmError {
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from LLM".to_string(),
            })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.call(prompt).await;
        metrics::record_llm(start.elapsed().as_secs_f64(), &self.config.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Build the chat model from settings; `None` when no API key is configured
pub fn create_llm_from_config(settings: &Settings) -> Result<Option<Arc<dyn ChatModel>>> {
    let Some(api_key) = settings.openai_api_key.clone() else {
        return Ok(None);
    };

    let llm = OpenAIChat::new(LLMConfig {
        api_base: settings.openai_api_base.clone(),
        api_key,
        model: settings.openai_model.clone(),
        temperature: 0.0,
        timeout_secs: settings.llm_timeout_secs,
    })?;

    Ok(Some(Arc::new(llm)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_means_no_llm() {
        let llm = create_llm_from_config(&Settings::default()).unwrap();
        assert!(llm.is_none());
    }

    #[test]
    fn test_llm_uses_configured_model() {
        let settings = Settings {
            openai_api_key: Some("sk-test".into()),
            openai_model: "gpt-4o-mini".into(),
            ..Settings::default()
        };
        let llm = create_llm_from_config(&settings).unwrap().unwrap();
        assert_eq!(llm.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let chat = OpenAIChat::new(LLMConfig {
            api_base: "http://localhost:11434/v1/".into(),
            ..LLMConfig::default()
        })
        .unwrap();
        assert_eq!(chat.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }
}
