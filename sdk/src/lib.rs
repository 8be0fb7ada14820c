//! Troupe SDK
//!
//! Shared contracts used by the engine and by every capability a role can hold:
//! the `Capability` trait, its input/output types, and the engine error type.

/// Capability trait and descriptors
pub mod capability;

/// Error types and handling
pub mod errors;

/// Capability input/output types
pub mod types;

// Re-export commonly used types
pub use capability::{Capability, CapabilityDescriptor};
pub use errors::{EngineError, TroupeErrorExt};
pub use types::{CapabilityError, CapabilityInput, CapabilityOutput};
