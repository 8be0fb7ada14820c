//! Roles
//!
//! The built-in role table, the provider/model pair each role runs on, and
//! how that pair is resolved for a `(project, team, role)` key.
//!
//! A role's instruction and capability set are fixed here at compile time.
//! Nothing a caller says in conversation can widen them.

use anyhow::Result;
use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::debug;

use crate::capabilities::names;
use crate::config::{LLMConfig, RoleOverride};

/// Model backend identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Ollama, ProviderKind::OpenAI];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAI => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAI),
            _ => Err(EngineError::UnknownProvider(s.to_string())),
        }
    }
}

/// Backend and model a role currently runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRoleConfig {
    pub provider: ProviderKind,
    pub model_name: String,
}

impl AgentRoleConfig {
    pub fn new(provider: ProviderKind, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
        }
    }
}

impl fmt::Display for AgentRoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model_name)
    }
}

/// Static definition of a role
#[derive(Debug)]
pub struct RoleSpec {
    /// Key used in config, storage and `delegate_to_<name>`
    pub name: &'static str,

    /// Label used in the activity log
    pub log_label: &'static str,

    /// Advertised to the coordinator in the delegation capability
    pub summary: &'static str,

    /// Fixed system instruction
    pub instruction: &'static str,

    /// Capabilities granted to the role, by name
    pub capabilities: &'static [&'static str],

    /// Whether the coordinator may delegate to this role
    pub delegatable: bool,
}

pub const COORDINATOR: &str = "coordinator";

static ROLES: [RoleSpec; 5] = [
    RoleSpec {
        name: COORDINATOR,
        log_label: "COORDINATOR",
        summary: "Plans work, tracks goals and delegates to specialists",
        instruction: "You are the coordinator of a small team. Break the user's request into \
            steps, keep the project goals current with the goal capabilities, and hand each \
            step to the specialist best suited for it. Report the outcome to the user plainly.",
        capabilities: &[names::ADD_GOAL, names::UPDATE_GOAL, names::GOAL_REPORT],
        delegatable: false,
    },
    RoleSpec {
        name: "coder",
        log_label: "CODER",
        summary: "Reads and writes source files and can inspect the screen",
        instruction: "You are the coder. You read, write and organize files in the workspace. \
            You cannot run commands. When finished, summarize exactly which files you changed.",
        capabilities: &[
            names::READ_FILE,
            names::WRITE_FILE,
            names::LIST_DIR,
            names::CAPTURE_SCREEN,
        ],
        delegatable: true,
    },
    RoleSpec {
        name: "sysadmin",
        log_label: "SYSADMIN",
        summary: "Runs shell commands in the workspace",
        instruction: "You are the sysadmin. You run shell commands in the workspace to inspect \
            and operate the system. You cannot edit files directly. Report each command's outcome.",
        capabilities: &[names::RUN_COMMAND],
        delegatable: true,
    },
    RoleSpec {
        name: "tester",
        log_label: "TESTER",
        summary: "Runs tests and reads or writes test files",
        instruction: "You are the tester. You write and run tests and read source files to \
            understand failures. Report which tests ran and which failed.",
        capabilities: &[
            names::READ_FILE,
            names::WRITE_FILE,
            names::LIST_DIR,
            names::RUN_COMMAND,
        ],
        delegatable: true,
    },
    RoleSpec {
        name: "doc_writer",
        log_label: "DOC_WRITER",
        summary: "Writes and edits documentation files",
        instruction: "You are the documentation writer. You read the workspace and write clear \
            documentation files. You cannot run commands.",
        capabilities: &[names::READ_FILE, names::WRITE_FILE, names::LIST_DIR],
        delegatable: true,
    },
];

impl RoleSpec {
    /// Every built-in role
    pub fn all() -> &'static [RoleSpec] {
        &ROLES
    }

    pub fn lookup(name: &str) -> Option<&'static RoleSpec> {
        ROLES.iter().find(|r| r.name == name)
    }

    /// Roles the coordinator may delegate to
    pub fn workers() -> impl Iterator<Item = &'static RoleSpec> {
        ROLES.iter().filter(|r| r.delegatable)
    }

    pub fn grants(&self, capability: &str) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Persisted per-role provider/model choices
#[async_trait]
pub trait RoleConfigStore: Send + Sync {
    async fn get_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
    ) -> Result<Option<AgentRoleConfig>>;

    async fn set_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
        config: &AgentRoleConfig,
    ) -> Result<()>;

    /// Stored configs for a team, by role name
    async fn list_role_configs(
        &self,
        project: &str,
        team: &str,
    ) -> Result<BTreeMap<String, AgentRoleConfig>>;
}

type RoleKey = (String, String, String);

/// Process-local role config store
#[derive(Debug, Default)]
pub struct InMemoryRoleConfigStore {
    configs: RwLock<HashMap<RoleKey, AgentRoleConfig>>,
}

impl InMemoryRoleConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleConfigStore for InMemoryRoleConfigStore {
    async fn get_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
    ) -> Result<Option<AgentRoleConfig>> {
        let key = (project.to_string(), team.to_string(), role.to_string());
        Ok(self.configs.read().await.get(&key).cloned())
    }

    async fn set_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
        config: &AgentRoleConfig,
    ) -> Result<()> {
        let key = (project.to_string(), team.to_string(), role.to_string());
        self.configs.write().await.insert(key, config.clone());
        Ok(())
    }

    async fn list_role_configs(
        &self,
        project: &str,
        team: &str,
    ) -> Result<BTreeMap<String, AgentRoleConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .iter()
            .filter(|((p, t, _), _)| p == project && t == team)
            .map(|((_, _, role), config)| (role.clone(), config.clone()))
            .collect())
    }
}

/// Resolves a role's `AgentRoleConfig`: stored value first, then the
/// `[roles.<name>]` override, then the `[llm]` default.
pub struct RoleResolver {
    llm: LLMConfig,
    overrides: BTreeMap<String, RoleOverride>,
}

impl RoleResolver {
    pub fn new(llm: LLMConfig, overrides: BTreeMap<String, RoleOverride>) -> Self {
        Self { llm, overrides }
    }

    /// Config that applies when nothing is stored
    pub fn configured(&self, role: &str) -> AgentRoleConfig {
        let role_override = self.overrides.get(role).cloned().unwrap_or_default();

        let provider = role_override.provider.unwrap_or(self.llm.default_provider);
        let model = match (role_override.model, role_override.provider) {
            (Some(model), _) => model,
            // A provider override without a model uses that provider's model
            (None, Some(provider)) => self.llm.model_for(provider),
            (None, None) => self
                .llm
                .default_model
                .clone()
                .unwrap_or_else(|| self.llm.model_for(provider)),
        };
        AgentRoleConfig::new(provider, model)
    }

    pub async fn resolve(
        &self,
        store: &dyn RoleConfigStore,
        project: &str,
        team: &str,
        role: &str,
    ) -> Result<AgentRoleConfig> {
        if RoleSpec::lookup(role).is_none() {
            return Err(EngineError::UnknownRole(role.to_string()).into());
        }

        if let Some(stored) = store.get_role_config(project, team, role).await? {
            debug!("Role {} uses stored config {}", role, stored);
            return Ok(stored);
        }

        let configured = self.configured(role);
        debug!("Role {} uses configured {}", role, configured);
        Ok(configured)
    }
}
