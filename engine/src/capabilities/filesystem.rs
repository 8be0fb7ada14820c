//! File capabilities
//!
//! `read_file`, `write_file` and `list_dir`, all confined to the workspace
//! through `WorkspaceGuard`.

use async_trait::async_trait;
use sdk::capability::{string_params_schema, Capability};
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::names;
use crate::fs_guard::WorkspaceGuard;

/// Files larger than this are refused by `read_file`
const MAX_READ_BYTES: u64 = 1024 * 1024;

pub struct ReadFileCapability {
    guard: Arc<WorkspaceGuard>,
}

impl ReadFileCapability {
    pub fn new(guard: Arc<WorkspaceGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Capability for ReadFileCapability {
    fn name(&self) -> &str {
        names::READ_FILE
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the workspace."
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[("path", "File path, relative to the workspace", true)])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let path = match input.param_str("path") {
            Ok(p) => p,
            Err(e) => return e.into(),
        };
        let path = match self.guard.resolve_existing(&path) {
            Ok(p) => p,
            Err(e) => {
                warn!("read_file refused {}: {}", path, e);
                return CapabilityOutput::error(e.to_string());
            }
        };

        match fs::metadata(&path).await {
            Ok(meta) if meta.len() > MAX_READ_BYTES => {
                return CapabilityOutput::error(format!(
                    "{} is {} bytes; read_file is limited to {} bytes",
                    path.display(),
                    meta.len(),
                    MAX_READ_BYTES
                ))
            }
            Ok(meta) if meta.is_dir() => {
                return CapabilityOutput::error(format!(
                    "{} is a directory; use list_dir",
                    path.display()
                ))
            }
            _ => {}
        }

        info!("Reading file: {}", path.display());
        match fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Read {} bytes from {}", content.len(), path.display());
                CapabilityOutput::text(content)
            }
            Err(e) => CapabilityOutput::error(format!("Failed to read {}: {}", path.display(), e)),
        }
    }
}

pub struct WriteFileCapability {
    guard: Arc<WorkspaceGuard>,
}

impl WriteFileCapability {
    pub fn new(guard: Arc<WorkspaceGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Capability for WriteFileCapability {
    fn name(&self) -> &str {
        names::WRITE_FILE
    }

    fn description(&self) -> &str {
        "Write text to a file in the workspace, creating parent directories as needed."
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[
            ("path", "File path, relative to the workspace", true),
            ("content", "Full file contents", true),
        ])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let path = match input.param_str("path") {
            Ok(p) => p,
            Err(e) => return e.into(),
        };
        // Empty content is a legitimate write
        let Some(content) = input.param_str_opt("content") else {
            return CapabilityOutput::error("Missing parameter: content");
        };

        let target = match self.guard.resolve_for_write(&path) {
            Ok(p) => p,
            Err(e) => {
                warn!("write_file refused {}: {}", path, e);
                return CapabilityOutput::error(e.to_string());
            }
        };

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return CapabilityOutput::error(format!(
                    "Failed to create directories {}: {}",
                    parent.display(),
                    e
                ));
            }
        }

        info!("Writing {} bytes to: {}", content.len(), target.display());
        match fs::write(&target, &content).await {
            Ok(()) => CapabilityOutput::json(json!({
                "path": target.display().to_string(),
                "bytes_written": content.len(),
            })),
            Err(e) => {
                CapabilityOutput::error(format!("Failed to write {}: {}", target.display(), e))
            }
        }
    }
}

pub struct ListDirCapability {
    guard: Arc<WorkspaceGuard>,
}

impl ListDirCapability {
    pub fn new(guard: Arc<WorkspaceGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Capability for ListDirCapability {
    fn name(&self) -> &str {
        names::LIST_DIR
    }

    fn description(&self) -> &str {
        "List a workspace directory. Directories end with '/'."
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[("path", "Directory path, defaults to the workspace root", false)])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let path = input
            .param_str_opt("path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| ".".to_string());
        let dir = match self.guard.resolve_existing(&path) {
            Ok(p) => p,
            Err(e) => return CapabilityOutput::error(e.to_string()),
        };

        let mut reader = match fs::read_dir(&dir).await {
            Ok(r) => r,
            Err(e) => {
                return CapabilityOutput::error(format!(
                    "Failed to read directory {}: {}",
                    dir.display(),
                    e
                ))
            }
        };

        let mut entries = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    entries.push(if is_dir { format!("{}/", name) } else { name });
                }
                Ok(None) => break,
                Err(e) => return CapabilityOutput::error(format!("Failed to list entry: {}", e)),
            }
        }
        // Directories first, then files, each alphabetical
        entries.sort_by(|a, b| (!a.ends_with('/'), a).cmp(&(!b.ends_with('/'), b)));

        CapabilityOutput::json(json!({
            "path": dir.display().to_string(),
            "entries": entries,
        }))
    }
}
