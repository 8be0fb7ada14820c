use async_trait::async_trait;
use sdk::capability::{string_params_schema, Capability};
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::names;
use crate::fs_guard::WorkspaceGuard;
use crate::security_gate::SecurityGate;

/// `capture_screen`: saves a screenshot into the workspace.
///
/// Uses the platform utility (`screencapture` on macOS, `scrot` on Linux).
pub struct CaptureScreenCapability {
    guard: Arc<WorkspaceGuard>,
    gate: Arc<SecurityGate>,
}

impl CaptureScreenCapability {
    pub fn new(guard: Arc<WorkspaceGuard>, gate: Arc<SecurityGate>) -> Self {
        Self { guard, gate }
    }

    /// Program and flag for the screenshot utility, if the platform has one
    fn utility() -> Option<(&'static str, &'static str)> {
        if cfg!(target_os = "macos") {
            Some(("screencapture", "-x"))
        } else if cfg!(target_os = "linux") {
            Some(("scrot", "--overwrite"))
        } else {
            None
        }
    }
}

#[async_trait]
impl Capability for CaptureScreenCapability {
    fn name(&self) -> &str {
        names::CAPTURE_SCREEN
    }

    fn description(&self) -> &str {
        "Capture a screenshot into a PNG file in the workspace."
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[(
            "output_file",
            "Destination path, defaults to screenshot.png",
            false,
        )])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let output_file = input
            .param_str_opt("output_file")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "screenshot.png".to_string());
        let save_path = match self.guard.resolve_for_write(&output_file) {
            Ok(p) => p,
            Err(e) => return CapabilityOutput::error(e.to_string()),
        };

        let Some((program, flag)) = Self::utility() else {
            return CapabilityOutput::error("Screen capture is not supported on this platform");
        };

        let command_line = format!("{} {} {}", program, flag, save_path.display());
        if let Err(denial) = self.gate.check(command_line.as_str()) {
            return CapabilityOutput::error_with(
                format!("Screenshot refused by security gate: {}", denial),
                json!({ "denied": true, "command": command_line }),
            );
        }

        info!("Capturing screenshot to: {}", save_path.display());
        let result = tokio::process::Command::new(program)
            .arg(flag)
            .arg(&save_path)
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => CapabilityOutput::json(json!({
                "path": save_path.display().to_string(),
            })),
            Ok(output) => {
                let err = String::from_utf8_lossy(&output.stderr);
                warn!("Screenshot command failed: {}", err);
                CapabilityOutput::error(format!("Screenshot failed: {}", err.trim()))
            }
            Err(e) => {
                warn!("Failed to execute screenshot utility: {}", e);
                CapabilityOutput::error(format!("Failed to execute screenshot utility: {}", e))
            }
        }
    }
}
