//! Configuration management
//!
//! This module handles loading, validation, and management of the Troupe
//! configuration. Configuration is stored in TOML format at
//! ~/.troupe/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Workspace path, log level, data directory, project and team keys
//! - **llm**: Default provider/model and per-provider endpoints
//! - **roles**: Optional per-role provider/model overrides
//! - **agent**: Conversation loop limits
//! - **goals**: Stimulus report settings
//! - **terminal**: Command capability settings
//!
//! # Path Expansion
//!
//! `~` is expanded to the user's home directory, the workspace is created if
//! missing and canonicalized, and the data directory is created on load.
//!
//! # Examples
//!
//! ```no_run
//! use troupe_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Workspace: {:?}", config.core.workspace);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::roles::ProviderKind;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub core: CoreConfig,

    pub llm: LLMConfig,

    /// Per-role overrides, keyed by role name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleOverride>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub goals: GoalsConfig,

    #[serde(default)]
    pub terminal: TerminalConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Workspace directory path (supports ~ expansion)
    pub workspace: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Project key for goals and logs. Defaults to the workspace path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Team key for role configuration
    #[serde(default = "default_team")]
    pub team: String,
}

impl CoreConfig {
    /// Effective project key
    pub fn project_key(&self) -> String {
        self.project
            .clone()
            .unwrap_or_else(|| self.workspace.display().to_string())
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider used by roles without an override
    pub default_provider: ProviderKind,

    /// Model used by roles without an override. Falls back to the
    /// provider section's model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub openai: OpenAIConfig,
}

impl LLMConfig {
    /// Model configured for a provider when nothing more specific is set
    pub fn model_for(&self, provider: ProviderKind) -> String {
        match provider {
            ProviderKind::Ollama => self.ollama.model.clone(),
            ProviderKind::OpenAI => self.openai.model.clone(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key; the key itself is never
    /// written to the config file
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
}

/// Override of a role's provider and/or model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Conversation loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model round trips per run before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Capacity of the bounded fragment queue between a run and its reader
    #[serde(default = "default_fragment_queue_capacity")]
    pub fragment_queue_capacity: usize,

    /// Approximate token budget of a session's working memory
    #[serde(default = "default_max_session_tokens")]
    pub max_session_tokens: usize,
}

/// Stimulus report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalsConfig {
    /// Pending items listed before the truncation marker
    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,
}

/// Command capability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Per-command timeout in seconds
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,

    /// Extra denylist entries added to the built-in ones
    #[serde(default)]
    pub extra_denylist: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.troupe/data")
}

fn default_team() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_iterations() -> usize {
    20
}

fn default_fragment_queue_capacity() -> usize {
    64
}

fn default_max_session_tokens() -> usize {
    16_000
}

fn default_pending_limit() -> usize {
    crate::goals::stimulus::DEFAULT_PENDING_LIMIT
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_openai_api_key_env(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            fragment_queue_capacity: default_fragment_queue_capacity(),
            max_session_tokens: default_max_session_tokens(),
        }
    }
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self {
            pending_limit: default_pending_limit(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_command_timeout(),
            extra_denylist: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.troupe/config.toml),
    /// creating a default one if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails (invalid paths, unknown provider, bad limits).
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create_at(&config_path)
    }

    /// Load configuration from `path`, creating a default one there if missing
    pub fn load_or_create_at(path: &Path) -> Result<Self, EngineError> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Self::create_default(path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.troupe/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".troupe").join("config.toml"))
    }

    /// Default configuration, before path processing
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                workspace: PathBuf::from("~/projects"),
                log_level: default_log_level(),
                data_dir: default_data_dir(),
                project: None,
                team: default_team(),
            },
            llm: LLMConfig {
                default_provider: ProviderKind::Ollama,
                default_model: None,
                request_timeout_secs: default_request_timeout(),
                ollama: OllamaConfig::default(),
                openai: OpenAIConfig::default(),
            },
            roles: BTreeMap::new(),
            agent: AgentConfig::default(),
            goals: GoalsConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }

    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("troupe.db")
    }

    /// Validate values, expand `~`, and create the workspace and data
    /// directories if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.core.team.trim().is_empty() {
            return Err(EngineError::Config("core.team must not be empty".to_string()));
        }

        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.fragment_queue_capacity == 0 {
            return Err(EngineError::Config(
                "agent.fragment_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.terminal.timeout_secs == 0 {
            return Err(EngineError::Config(
                "terminal.timeout_secs must be at least 1".to_string(),
            ));
        }

        for name in self.roles.keys() {
            if crate::roles::RoleSpec::lookup(name).is_none() {
                return Err(EngineError::Config(format!(
                    "Unknown role '{}' in [roles]",
                    name
                )));
            }
        }

        self.core.workspace = expand_path(&self.core.workspace)?;
        self.core.workspace = canonicalize_or_create(&self.core.workspace)?;

        if !self.core.workspace.is_dir() {
            return Err(EngineError::Config(format!(
                "Workspace path is not a directory: {:?}",
                self.core.workspace
            )));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Canonicalize path, creating the directory first if it doesn't exist
fn canonicalize_or_create(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::Config(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }
    path.canonicalize()
        .map_err(|e| EngineError::PathCanonicalization(path.to_path_buf(), e.to_string()))
}
