//! Capability registry and built-in capabilities
//!
//! Every capability a role can call is an `Arc<dyn Capability>` registered
//! under its name. A role never sees the full catalog: `scoped_to` builds a
//! registry holding only the capabilities its `RoleSpec` grants.

pub mod filesystem;
pub mod goals;
pub mod terminal;
pub mod vision;

pub use filesystem::{ListDirCapability, ReadFileCapability, WriteFileCapability};
pub use goals::{AddGoalCapability, GoalReportCapability, UpdateGoalCapability};
pub use terminal::RunCommandCapability;
pub use vision::CaptureScreenCapability;

use sdk::capability::{Capability, CapabilityDescriptor};
use sdk::types::{CapabilityInput, CapabilityOutput};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::roles::RoleSpec;

/// Built-in capability names
pub mod names {
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_FILE: &str = "write_file";
    pub const LIST_DIR: &str = "list_dir";
    pub const CAPTURE_SCREEN: &str = "capture_screen";
    pub const RUN_COMMAND: &str = "run_command";
    pub const ADD_GOAL: &str = "add_goal";
    pub const UPDATE_GOAL: &str = "update_goal";
    pub const GOAL_REPORT: &str = "goal_report";

    /// Prefix of the per-role delegation capabilities
    pub const DELEGATE_PREFIX: &str = "delegate_to_";
}

/// Name-indexed set of capabilities
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    // BTreeMap keeps advertisement order stable across runs
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any previous one with the same name
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Descriptors advertised to a model provider
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities.values().map(|c| c.descriptor()).collect()
    }

    /// Registry holding exactly the capabilities `role` is granted.
    ///
    /// Grants missing from this catalog are skipped with a warning.
    pub fn scoped_to(&self, role: &RoleSpec) -> CapabilityRegistry {
        let mut scoped = CapabilityRegistry::new();
        for name in role.capabilities {
            match self.get(name) {
                Some(capability) => scoped.register(capability),
                None => warn!("Role {} is granted '{}' but it is not available", role.name, name),
            }
        }
        scoped
    }

    /// Dispatch a call by name with JSON-encoded arguments.
    ///
    /// Unknown names and malformed arguments come back as error outputs so
    /// the model can see the problem and correct itself.
    pub async fn dispatch(&self, name: &str, arguments_json: &str) -> CapabilityOutput {
        debug!("Dispatching capability '{}' with args: {}", name, arguments_json);

        let Some(capability) = self.capabilities.get(name) else {
            warn!("Unknown capability requested: {}", name);
            return CapabilityOutput::error(format!(
                "Unknown capability '{}'. Available capabilities: {}",
                name,
                self.names().join(", ")
            ));
        };

        let arguments = if arguments_json.trim().is_empty() {
            "{}"
        } else {
            arguments_json
        };
        match CapabilityInput::from_json(arguments) {
            Ok(input) => capability.invoke(input).await,
            Err(e) => e.into(),
        }
    }

    /// Instruction block describing the capabilities and the JSON-in-text
    /// call format, for models without native tool calling.
    pub fn prompt_section(&self) -> String {
        if self.is_empty() {
            return "You have no capabilities. Answer in plain text.".to_string();
        }

        let mut parts = vec![
            "To call a capability, respond with ONLY this JSON object and nothing else:"
                .to_string(),
            r#"{"function": "capability_name", "arguments": {"arg": "value"}}"#.to_string(),
            "When you are done, respond with plain text only. Never invent capability output."
                .to_string(),
            String::new(),
            "Available capabilities:".to_string(),
        ];
        for descriptor in self.descriptors() {
            parts.push(format!(
                "- {}: {} Arguments: {}",
                descriptor.name, descriptor.description, descriptor.parameters["properties"]
            ));
        }
        parts.join("\n")
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sdk::capability::string_params_schema;
    use serde_json::Value;

    struct Named(&'static str);

    #[async_trait]
    impl Capability for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Test capability."
        }

        fn parameters(&self) -> Value {
            string_params_schema(&[("path", "A path", true)])
        }

        async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
            match input.param_str("path") {
                Ok(path) => CapabilityOutput::text(format!("{}:{}", self.0, path)),
                Err(e) => e.into(),
            }
        }
    }

    fn catalog() -> CapabilityRegistry {
        [names::READ_FILE, names::WRITE_FILE, names::LIST_DIR, names::RUN_COMMAND]
            .into_iter()
            .fold(CapabilityRegistry::new(), |r, n| r.with(Arc::new(Named(n))))
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let output = catalog()
            .dispatch(names::READ_FILE, r#"{"path": "a.txt"}"#)
            .await;
        assert_eq!(output.to_text(), "read_file:a.txt");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_bad_arguments() {
        let registry = catalog();
        let unknown = registry.dispatch("launch_missiles", "{}").await.into_map();
        assert!(unknown["error"].as_str().unwrap().contains("read_file"));

        let bad = registry.dispatch(names::READ_FILE, "not json").await;
        assert!(!bad.success);

        let missing = registry.dispatch(names::READ_FILE, "").await;
        assert_eq!(missing.error.as_deref(), Some("Missing parameter: path"));
    }

    #[test]
    fn test_scoped_to_role() {
        let coder = RoleSpec::lookup("coder").unwrap();
        let scoped = catalog().scoped_to(coder);
        // capture_screen is not in this catalog, run_command is not granted
        assert_eq!(scoped.names(), vec!["list_dir", "read_file", "write_file"]);

        let sysadmin = RoleSpec::lookup("sysadmin").unwrap();
        assert_eq!(catalog().scoped_to(sysadmin).names(), vec!["run_command"]);
    }

    #[test]
    fn test_prompt_section_lists_capabilities() {
        let prompt = catalog().prompt_section();
        assert!(prompt.contains("- run_command: Test capability."));
        assert!(CapabilityRegistry::new().prompt_section().contains("no capabilities"));
    }
}
