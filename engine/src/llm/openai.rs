//! OpenAI-compatible chat completions provider
//!
//! Works against any endpoint speaking the `/chat/completions` protocol. The
//! API key is read from the environment variable named in the config.

use async_trait::async_trait;
use reqwest::Client;
use sdk::capability::CapabilityDescriptor;
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    response_from_text, tools_payload, LLMError, LLMProvider, LLMResponse, Message, ToolCall,
};
use crate::config::OpenAIConfig;

pub struct OpenAIProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client,
        }
    }

    /// Build from config, taking the key from `config.api_key_env`
    pub fn from_config(config: &OpenAIConfig, model: impl Into<String>, timeout: Duration) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; OpenAI requests will fail authentication",
                config.api_key_env
            );
        }
        Self::new(&config.base_url, model, api_key, timeout)
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut m = json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                });
                if !msg.tool_calls.is_empty() {
                    m["tool_calls"] = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": { "name": call.name, "arguments": call.arguments },
                            })
                        })
                        .collect();
                }
                if let Some(id) = &msg.tool_call_id {
                    m["tool_call_id"] = json!(id);
                }
                m
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        messages: &[Message],
        capabilities: &[CapabilityDescriptor],
    ) -> super::Result<LLMResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LLMError::AuthenticationFailed("No OpenAI API key configured".to_string())
        })?;

        let url = format!("{}/chat/completions", self.base_url);

        let mut payload = json!({
            "model": self.model,
            "messages": Self::convert_messages(messages),
        });
        if !capabilities.is_empty() {
            payload["tools"] = Value::Array(tools_payload(capabilities));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                500..=599 => {
                    LLMError::ProviderUnavailable(format!("OpenAI error ({}): {}", status, text))
                }
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| LLMError::ParseError("No message in response".to_string()))?;

        let native_call = message
            .get("tool_calls")
            .and_then(|calls| calls.as_array())
            .and_then(|calls| calls.first())
            .and_then(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?;
                let arguments = function
                    .get("arguments")
                    .and_then(|a| a.as_str())
                    .unwrap_or("{}");
                Some(match call.get("id").and_then(|id| id.as_str()) {
                    Some(id) => ToolCall::new(id, name, arguments),
                    None => ToolCall::generated(name, arguments),
                })
            });
        if let Some(call) = native_call {
            return Ok(LLMResponse::ToolCall(call));
        }

        match message.get("content").and_then(|c| c.as_str()) {
            Some(content) => Ok(response_from_text(content.to_string())),
            None => Err(LLMError::ParseError("Empty content".to_string())),
        }
    }
}
