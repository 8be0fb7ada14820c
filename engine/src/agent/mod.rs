//! Agent runtime
//!
//! `Agent` runs one role's conversation loop against a provider; `Session`
//! holds the conversation state it runs on.

pub mod core;
pub mod session;

pub use self::core::{Agent, AgentRun, Fragment, DEFAULT_MAX_ITERATIONS, DEFAULT_QUEUE_CAPACITY};
pub use session::Session;

/// Context shared by every role's instruction
#[derive(Debug, Clone)]
pub struct SharedContext {
    pub date: String,
    pub working_dir: String,
    pub project: String,
}

impl SharedContext {
    pub fn new(working_dir: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            working_dir: working_dir.into(),
            project: project.into(),
        }
    }

    fn render(&self) -> String {
        format!(
            "## Context\nDate: {}\nWorking directory: {}\nProject: {}",
            self.date, self.working_dir, self.project
        )
    }
}

/// System instruction for a role: its own instruction, the shared context,
/// then how to call the capabilities it holds.
pub fn compose_instruction(
    role_instruction: &str,
    context: &SharedContext,
    capabilities_section: &str,
) -> String {
    let mut out = format!("{}\n\n{}", role_instruction.trim_end(), context.render());
    if !capabilities_section.is_empty() {
        out.push_str("\n\n");
        out.push_str(capabilities_section);
    }
    out
}
