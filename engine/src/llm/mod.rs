//! Model Provider Abstraction Layer
//!
//! A provider takes a conversation plus the capability descriptors a role
//! holds and answers with either a capability call or a final answer.
//! `OllamaProvider` and `OpenAIProvider` implement it over HTTP; tests
//! script their own.

use async_trait::async_trait;
use sdk::capability::CapabilityDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a model provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Max iterations ({0}) exceeded")]
    MaxIterationsExceeded(usize),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,

    pub content: String,

    /// Capability calls requested by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Call being answered, for tool result messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Assistant turn that requested a capability call
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Self::with_role(MessageRole::Assistant, "")
        }
    }

    /// Result of a capability call
    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Response from a model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// The model wants to invoke a capability
    ToolCall(ToolCall),

    /// The model has finished
    FinalAnswer(FinalAnswer),
}

/// Capability call request from the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,

    /// Capability name
    pub name: String,

    /// Arguments as a JSON-encoded object
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Tool call with a generated id
    pub fn generated(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(format!("call_{}", uuid::Uuid::new_v4()), name, arguments)
    }
}

/// Final answer from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,
}

impl FinalAnswer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Model provider trait
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// Model the provider is bound to
    fn model(&self) -> &str;

    /// Generate the next step of a conversation
    ///
    /// # Arguments
    /// * `messages` - Conversation history including the system instruction
    /// * `capabilities` - Capabilities the model may call; empty means none
    async fn generate(
        &self,
        messages: &[Message],
        capabilities: &[CapabilityDescriptor],
    ) -> Result<LLMResponse>;

    /// Check if the provider is reachable
    async fn check_health(&self) -> bool {
        true
    }
}

/// Interpret assistant text as a final answer, unless it embeds a
/// JSON-in-text capability call.
pub(crate) fn response_from_text(content: String) -> LLMResponse {
    match parse_tool_calls(&content) {
        Some(call) => LLMResponse::ToolCall(call),
        None => LLMResponse::FinalAnswer(FinalAnswer::new(content)),
    }
}

/// Render capability descriptors in the `tools` wire format shared by the
/// Ollama and OpenAI chat APIs.
pub(crate) fn tools_payload(capabilities: &[CapabilityDescriptor]) -> Vec<serde_json::Value> {
    capabilities
        .iter()
        .map(|c| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": c.name,
                    "description": c.description,
                    "parameters": c.parameters,
                }
            })
        })
        .collect()
}

/// Fallback for models without native tool calling.
///
/// Recognizes `{"function": "...", "arguments": {...}}` either as the whole
/// message, inside a markdown code fence, or embedded in prose.
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    if let Some(call) = function_json(trimmed) {
        return Some(call);
    }

    if let Some(call) = fenced_block(trimmed).and_then(|body| function_json(body.trim())) {
        return Some(call);
    }

    let start = trimmed.find("{\"function\"")?;
    balanced_object(&trimmed[start..]).and_then(function_json)
}

fn function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json.get("arguments")?;
    Some(ToolCall::generated(function, arguments.to_string()))
}

/// Body of the first markdown code fence, skipping the language tag line
fn fenced_block(content: &str) -> Option<&str> {
    let open = content.find("```")? + 3;
    let body_start = open + content[open..].find('\n')? + 1;
    let body_end = body_start + content[body_start..].find("```")?;
    (body_start < body_end).then(|| &content[body_start..body_end])
}

/// Prefix of `s` up to the brace closing its first `{`, ignoring braces
/// inside string literals
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
