//! Capability input/output types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments passed to a capability invocation, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInput {
    pub params: Map<String, Value>,
}

impl CapabilityInput {
    /// Create an empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an input from a JSON value. Non-object values yield an empty map.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(params) => Self { params },
            _ => Self::default(),
        }
    }

    /// Parse an input from a JSON-encoded argument string
    pub fn from_json(arguments: &str) -> Result<Self, CapabilityError> {
        let value: Value = serde_json::from_str(arguments)
            .map_err(|e| CapabilityError::InvalidParameter(format!("arguments: {}", e)))?;
        match value {
            Value::Object(params) => Ok(Self { params }),
            Value::Null => Ok(Self::default()),
            other => Err(CapabilityError::InvalidParameter(format!(
                "arguments must be an object, got {}",
                other
            ))),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a required, non-empty string parameter
    pub fn param_str(&self, key: &str) -> Result<String, CapabilityError> {
        match self.params.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(CapabilityError::InvalidParameter(format!(
                "{} must not be empty",
                key
            ))),
            Some(_) => Err(CapabilityError::InvalidParameter(format!(
                "{} must be a string",
                key
            ))),
            None => Err(CapabilityError::MissingParameter(key.to_string())),
        }
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Get an optional bool parameter
    pub fn param_bool_opt(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    /// Get an optional i64 parameter
    pub fn param_i64_opt(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }
}

/// Result of a capability invocation.
///
/// Either a success payload or a human-readable error; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl CapabilityOutput {
    /// Create a successful output with text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            data: serde_json::json!({ "text": text.into() }),
            error: None,
        }
    }

    /// Create a successful output with JSON data
    pub fn json(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error output
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Create an error output that carries extra structured fields
    /// (e.g. a security denial marker).
    pub fn error_with(error: impl Into<String>, data: Value) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }

    /// Flatten into the key-value result map handed back to the model.
    ///
    /// Success payload objects are returned as-is (scalars are wrapped under
    /// `result`); failures always carry an `error` key.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = match self.data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        if let Some(error) = self.error {
            map.insert("error".to_string(), Value::String(error));
        }
        map
    }

    /// Render the output as the text fed back into a conversation.
    ///
    /// Plain text payloads are returned verbatim; everything else as JSON.
    pub fn to_text(&self) -> String {
        if self.success {
            if let Some(text) = self.data.get("text").and_then(|t| t.as_str()) {
                if self.data.as_object().map(|o| o.len() == 1).unwrap_or(false) {
                    return text.to_string();
                }
            }
        }
        Value::Object(self.clone().into_map()).to_string()
    }
}

impl From<CapabilityError> for CapabilityOutput {
    fn from(err: CapabilityError) -> Self {
        CapabilityOutput::error(err.to_string())
    }
}

/// Capability argument errors
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
