//! Security gate and workspace confinement, through the public API and the
//! `run_command` capability.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sdk::capability::Capability;
use sdk::types::CapabilityInput;
use troupe_engine::capabilities::{ReadFileCapability, RunCommandCapability, WriteFileCapability};
use troupe_engine::fs_guard::WorkspaceGuard;
use troupe_engine::security_gate::{is_allowed, GateDenial, SecurityGate};

#[test]
fn test_reference_cases() {
    assert!(!is_allowed("RM -RF /"));
    assert!(is_allowed("ls -la"));
    assert!(!is_allowed(""));
    assert!(!is_allowed(None));
    assert!(!is_allowed("   "));
}

#[test]
fn test_substring_anywhere_in_command() {
    assert!(!is_allowed("echo hi && sudo SHUTDOWN -h now"));
    assert!(!is_allowed("cat x | mkfs.ext4 /dev/sdb1"));
    assert!(is_allowed("cargo test --workspace"));
    assert!(is_allowed("git status"));
}

#[test]
fn test_custom_patterns_are_case_insensitive() {
    let mut gate = SecurityGate::with_denylist(vec!["DROP TABLE".to_string()]);
    gate.deny_pattern("Curl");

    assert_eq!(
        gate.check("psql -c 'drop table users'"),
        Err(GateDenial::BlockedPattern("drop table".to_string()))
    );
    assert!(!gate.is_allowed("CURL http://example.com"));
    assert!(gate.is_allowed("rm -rf /"));
    assert_eq!(gate.check(None), Err(GateDenial::Empty));
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_command_refuses_before_spawning() {
    let temp = TempDir::new().unwrap();
    let capability = RunCommandCapability::new(
        temp.path().to_path_buf(),
        Duration::from_secs(5),
        Arc::new(SecurityGate::new()),
    );

    let map = capability
        .invoke(CapabilityInput::new().with_param("command", json!("touch made && reboot")))
        .await
        .into_map();

    assert_eq!(map["denied"], json!(true));
    assert!(map.contains_key("error"));
    assert!(!temp.path().join("made").exists());
}

#[tokio::test]
async fn test_file_capabilities_stay_in_workspace() {
    let temp = TempDir::new().unwrap();
    let guard = Arc::new(WorkspaceGuard::new(temp.path()).unwrap());
    let read = ReadFileCapability::new(Arc::clone(&guard));
    let write = WriteFileCapability::new(Arc::clone(&guard));

    let escaped = write
        .invoke(
            CapabilityInput::new()
                .with_param("path", json!("../outside.txt"))
                .with_param("content", json!("x")),
        )
        .await;
    assert!(!escaped.success);

    let secret = write
        .invoke(
            CapabilityInput::new()
                .with_param("path", json!(".env"))
                .with_param("content", json!("TOKEN=1")),
        )
        .await;
    assert!(!secret.success);

    let absolute = read
        .invoke(CapabilityInput::new().with_param("path", json!("/etc/passwd")))
        .await;
    assert!(!absolute.success);

    let ok = write
        .invoke(
            CapabilityInput::new()
                .with_param("path", json!("notes/today.md"))
                .with_param("content", json!("hello")),
        )
        .await;
    assert!(ok.success);
    let back = read
        .invoke(CapabilityInput::new().with_param("path", json!("notes/today.md")))
        .await;
    assert_eq!(back.to_text(), "hello");
}
