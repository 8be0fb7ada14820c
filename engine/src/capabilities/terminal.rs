//! Command capability
//!
//! `run_command` runs a shell command in the workspace. Every command passes
//! the security gate immediately before the process is spawned; a refused
//! command comes back as a structured denial and nothing is executed.

use async_trait::async_trait;
use sdk::capability::{string_params_schema, Capability};
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::names;
use crate::security_gate::SecurityGate;

/// Output beyond this many bytes per stream is cut off
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

pub struct RunCommandCapability {
    work_dir: PathBuf,
    timeout: Duration,
    gate: Arc<SecurityGate>,
}

impl RunCommandCapability {
    pub fn new(work_dir: PathBuf, timeout: Duration, gate: Arc<SecurityGate>) -> Self {
        Self {
            work_dir,
            timeout,
            gate,
        }
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

fn truncated(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[output truncated]", &text[..cut])
}

#[async_trait]
impl Capability for RunCommandCapability {
    fn name(&self) -> &str {
        names::RUN_COMMAND
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return its exit code, stdout and stderr."
    }

    fn parameters(&self) -> Value {
        string_params_schema(&[("command", "Shell command line to run", true)])
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let command = input.param_str_opt("command");

        if let Err(denial) = self.gate.check(command.as_deref()) {
            return CapabilityOutput::error_with(
                format!("Command refused by security gate: {}", denial),
                json!({ "denied": true, "command": command }),
            );
        }
        let Some(command) = command else {
            return CapabilityOutput::error("Missing parameter: command");
        };

        info!("Executing command: {}", command);
        let child = Self::shell(&command)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return CapabilityOutput::error(format!("Failed to start command: {}", e)),
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return CapabilityOutput::error(format!("Command failed: {}", e)),
            Err(_) => {
                warn!("Command timed out after {}s: {}", self.timeout.as_secs(), command);
                return CapabilityOutput::error_with(
                    format!("Command timed out after {} seconds", self.timeout.as_secs()),
                    json!({ "timed_out": true }),
                );
            }
        };

        let data = json!({
            "exit_code": output.status.code(),
            "stdout": truncated(&output.stdout),
            "stderr": truncated(&output.stderr),
        });
        if output.status.success() {
            CapabilityOutput::json(data)
        } else {
            warn!("Command exited with {}: {}", output.status, command);
            CapabilityOutput::error_with(format!("Command exited with {}", output.status), data)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn capability(temp: &TempDir, timeout_secs: u64) -> RunCommandCapability {
        RunCommandCapability::new(
            temp.path().to_path_buf(),
            Duration::from_secs(timeout_secs),
            Arc::new(SecurityGate::new()),
        )
    }

    fn command(cmd: &str) -> CapabilityInput {
        CapabilityInput::new().with_param("command", json!(cmd))
    }

    #[tokio::test]
    async fn test_runs_in_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();

        let output = capability(&temp, 10).invoke(command("ls")).await;
        assert!(output.success);
        assert_eq!(output.data["exit_code"], 0);
        assert!(output.data["stdout"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_denied_command_is_not_executed() {
        let temp = TempDir::new().unwrap();
        let canary = temp.path().join("canary");
        std::fs::write(&canary, "alive").unwrap();

        let output = capability(&temp, 10)
            .invoke(command("rm canary; shutdown -h now"))
            .await;
        let map = output.into_map();
        assert_eq!(map["denied"], json!(true));
        assert!(map["error"].as_str().unwrap().contains("shutdown"));
        assert!(canary.exists());
    }

    #[tokio::test]
    async fn test_missing_command_is_denied() {
        let temp = TempDir::new().unwrap();
        let map = capability(&temp, 10)
            .invoke(CapabilityInput::new())
            .await
            .into_map();
        assert_eq!(map["denied"], json!(true));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_error_with_output() {
        let temp = TempDir::new().unwrap();
        let output = capability(&temp, 10)
            .invoke(command("echo oops >&2; exit 3"))
            .await;
        assert!(!output.success);
        assert_eq!(output.data["exit_code"], 3);
        assert!(output.data["stderr"].as_str().unwrap().contains("oops"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = TempDir::new().unwrap();
        let output = capability(&temp, 1).invoke(command("sleep 5")).await;
        assert_eq!(output.into_map()["timed_out"], json!(true));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_OUTPUT_BYTES);
        let out = truncated(long.as_bytes());
        assert!(out.ends_with("[output truncated]"));
    }
}
