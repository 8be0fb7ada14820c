//! troupe engine library
//!
//! Goal tracking, activity logging and role delegation for the `troupe`
//! binary. Integration tests use it directly.

/// Indented goal documents, the goal store and the stimulus report
pub mod goals;

/// Activity log entries, store and document format
pub mod activity;

/// Command denylist check
pub mod security_gate;

/// Workspace path confinement
pub mod fs_guard;

/// Capability registry and built-in capabilities
pub mod capabilities;

/// Built-in roles and per-role provider assignment
pub mod roles;

/// Model provider abstraction layer
pub mod llm;

/// Agent loop and sessions
pub mod agent;

/// Delegation to worker roles
pub mod delegation;

/// The user-facing coordinator role
pub mod coordinator;

/// Configuration management
pub mod config;

/// SQLite persistence
pub mod db;

/// Logging setup
pub mod telemetry;

/// CLI interface
pub mod cli;

/// Command handlers
pub mod handlers;
