//! Capability trait and descriptors
//!
//! A capability is a named, schema-described operation a role may invoke.
//! Every capability the engine hands to a role implements `Capability`; the
//! engine registers them in a lookup table and dispatches by name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CapabilityInput, CapabilityOutput};

/// Trait that all capabilities must implement
#[async_trait]
pub trait Capability: Send + Sync {
    /// Unique name the model uses to call this capability
    fn name(&self) -> &str;

    /// One-line description advertised to the model
    fn description(&self) -> &str;

    /// JSON schema (`type: object`) describing accepted parameters
    fn parameters(&self) -> Value;

    /// Invoke the capability.
    ///
    /// Implementations never fail out-of-band: validation problems, denials
    /// and downstream errors come back as `CapabilityOutput::error`.
    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput;

    /// Descriptor advertised to model providers
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Serializable description of a capability: `{name, description, parameters}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl CapabilityDescriptor {
    /// Names of the required parameters declared in the schema
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Build a `type: object` schema with string properties.
///
/// `props` is a list of `(name, description, required)`.
pub fn string_params_schema(props: &[(&str, &str, bool)]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, description, is_required) in props {
        properties.insert(
            name.to_string(),
            serde_json::json!({ "type": "string", "description": description }),
        );
        if *is_required {
            required.push(Value::String(name.to_string()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
