//! Error types and handling
//!
//! This module provides the error types used throughout the Troupe engine.
//! All errors implement the `TroupeErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Capability failures are normally reported in-band as a `CapabilityOutput`
//! carrying an `error` key; `EngineError` is for the layers around them
//! (configuration, persistence, provider construction, CLI handlers).

use thiserror::Error;

/// Trait for Troupe error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait TroupeErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Database**: Goal/log/role store failures
/// - **LLM Provider**: Provider construction or API failures
/// - **Capability**: Unknown capability or invalid arguments
/// - **Goals**: Unknown goal ids, unparsable status tokens
/// - **Delegation**: Unknown roles, nested run failures
/// - **File System**: Path validation and access errors
/// - **Security**: Command gate denials
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, TroupeErrorExt};
///
/// let error = EngineError::CommandDenied("rm -rf /".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Database("disk I/O error".to_string());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    // Capability errors
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Capability error: {0}")]
    Capability(String),

    // Goal errors
    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    #[error("Invalid goal status: {0}")]
    InvalidGoalStatus(String),

    // Delegation errors
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Delegation failed: {0}")]
    Delegation(String),

    // Agent loop errors
    #[error("Max iterations exceeded")]
    MaxIterationsExceeded,

    // File system security errors
    #[error("Path denied: {0:?}")]
    PathDenied(std::path::PathBuf),

    #[error("Path outside workspace: {0:?}")]
    PathOutsideWorkspace(std::path::PathBuf),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // Security errors
    #[error("Command denied by security gate: {0}")]
    CommandDenied(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TroupeErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Database(_) => "Goal store unavailable. Check the data directory",

            Self::LLMProvider(_) => "Model provider unavailable. Check your API keys and network",
            Self::UnknownProvider(_) => "Use one of the supported providers: ollama, openai",

            Self::CapabilityNotFound(_) => "The requested capability is not granted to this role",
            Self::Capability(_) => "Capability call failed",

            Self::GoalNotFound(_) => "No goal with that id exists in this project",
            Self::InvalidGoalStatus(_) => {
                "Use one of: PENDING, IN_PROGRESS, COMPLETED, FAILED"
            }

            Self::UnknownRole(_) => "Use 'troupe role list' to see the configured roles",
            Self::Delegation(_) => "The delegated role could not finish. Try again",

            Self::MaxIterationsExceeded => "Task too complex. Try breaking it into smaller steps",

            Self::PathDenied(_) => "Access to this path is not allowed",
            Self::PathOutsideWorkspace(_) => "Operation must be within workspace",
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            Self::CommandDenied(_) => "This command is blocked by the security gate",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Persistence is the only layer allowed to be fatal
            Self::Database(_) | Self::Config(_) => false,

            _ => true,
        }
    }
}
