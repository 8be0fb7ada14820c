//! Configuration loading through the public API

use std::path::Path;
use tempfile::TempDir;

use troupe_engine::config::Config;
use troupe_engine::roles::{
    AgentRoleConfig, InMemoryRoleConfigStore, ProviderKind, RoleConfigStore, RoleResolver,
};

fn full_config(dir: &Path) -> String {
    format!(
        r#"
[core]
workspace = {:?}
data_dir = {:?}
log_level = "debug"
project = "website"
team = "night-shift"

[llm]
default_provider = "ollama"
request_timeout_secs = 90

[llm.ollama]
base_url = "http://gpu-box:11434"
model = "qwen2.5-coder:14b"

[llm.openai]
model = "gpt-4o"
api_key_env = "TROUPE_OPENAI_KEY"

[roles.coordinator]
provider = "openai"

[roles.tester]
model = "llama3.1:8b"

[agent]
max_iterations = 12
fragment_queue_capacity = 8

[goals]
pending_limit = 3

[terminal]
timeout_secs = 10
extra_denylist = ["git push --force"]
"#,
        dir.join("ws"),
        dir.join("data"),
    )
}

#[test]
fn test_full_config_parses() {
    let temp = TempDir::new().unwrap();
    let config = Config::from_toml_str(&full_config(temp.path())).unwrap();

    assert_eq!(config.core.project_key(), "website");
    assert_eq!(config.core.team, "night-shift");
    assert_eq!(config.llm.request_timeout_secs, 90);
    assert_eq!(config.llm.ollama.base_url, "http://gpu-box:11434");
    assert_eq!(config.llm.openai.api_key_env, "TROUPE_OPENAI_KEY");
    assert_eq!(config.agent.max_iterations, 12);
    assert_eq!(config.goals.pending_limit, 3);
    assert_eq!(config.terminal.extra_denylist, vec!["git push --force"]);
    assert_eq!(config.database_path(), config.core.data_dir.join("troupe.db"));
    assert!(config.core.workspace.is_dir());
}

#[tokio::test]
async fn test_role_resolution_order() {
    let temp = TempDir::new().unwrap();
    let config = Config::from_toml_str(&full_config(temp.path())).unwrap();
    let resolver = RoleResolver::new(config.llm.clone(), config.roles.clone());
    let store = InMemoryRoleConfigStore::new();

    // Provider override without a model takes that provider's model
    assert_eq!(
        resolver.resolve(&store, "website", "night-shift", "coordinator").await.unwrap(),
        AgentRoleConfig::new(ProviderKind::OpenAI, "gpt-4o")
    );
    assert_eq!(
        resolver.resolve(&store, "website", "night-shift", "tester").await.unwrap(),
        AgentRoleConfig::new(ProviderKind::Ollama, "llama3.1:8b")
    );
    assert_eq!(
        resolver.resolve(&store, "website", "night-shift", "coder").await.unwrap(),
        AgentRoleConfig::new(ProviderKind::Ollama, "qwen2.5-coder:14b")
    );

    // A stored choice beats the file
    store
        .set_role_config(
            "website",
            "night-shift",
            "coder",
            &AgentRoleConfig::new(ProviderKind::OpenAI, "gpt-4o-mini"),
        )
        .await
        .unwrap();
    assert_eq!(
        resolver.resolve(&store, "website", "night-shift", "coder").await.unwrap(),
        AgentRoleConfig::new(ProviderKind::OpenAI, "gpt-4o-mini")
    );
    // Only for that team
    assert_eq!(
        resolver.resolve(&store, "website", "default", "coder").await.unwrap().model_name,
        "qwen2.5-coder:14b"
    );

    assert!(resolver.resolve(&store, "website", "night-shift", "pilot").await.is_err());
}

#[test]
fn test_invalid_values_rejected() {
    let temp = TempDir::new().unwrap();
    let base = full_config(temp.path());

    for (from, to) in [
        ("default_provider = \"ollama\"", "default_provider = \"gemini\""),
        ("max_iterations = 12", "max_iterations = 0"),
        ("timeout_secs = 10", "timeout_secs = 0"),
        ("team = \"night-shift\"", "team = \"  \""),
        ("[roles.tester]", "[roles.designer]"),
    ] {
        let text = base.replace(from, to);
        assert!(Config::from_toml_str(&text).is_err(), "accepted {}", to);
    }
}

#[test]
fn test_load_or_create_writes_a_loadable_default() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    // The default points the workspace at ~/projects; write our own first
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, full_config(temp.path())).unwrap();

    let first = Config::load_or_create_at(&path).unwrap();
    let second = Config::load_from_path(&path).unwrap();
    assert_eq!(first.core.workspace, second.core.workspace);
    assert_eq!(second.llm.default_provider, ProviderKind::Ollama);
}
