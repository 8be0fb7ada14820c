//! Command handlers for CLI operations
//!
//! One handler per command group. Handlers print either human-readable text
//! or JSON depending on `OutputFormat`, and propagate store failures.

use anyhow::{bail, Context, Result};
use sdk::capability::Capability;
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::activity::{import_log, render_log, LogStore};
use crate::capabilities::{AddGoalCapability, UpdateGoalCapability};
use crate::cli::{GoalAction, LogAction, RoleAction};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::db::{Database, StoreRegistry};
use crate::delegation::DefaultProviderFactory;
use crate::goals::{count_goals, parse_goals, render_goals, Goal, GoalStore, StimulusRanker};
use crate::llm::{LLMProvider, OllamaProvider};
use crate::roles::{AgentRoleConfig, ProviderKind, RoleConfigStore, RoleResolver, RoleSpec};
use crate::security_gate::SecurityGate;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn write_or_print(output: Option<&Path>, document: &str) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, document)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", document);
            Ok(())
        }
    }
}

/// Run one coordinator turn
pub async fn handle_run(
    task: String,
    config: &Config,
    stores: &StoreRegistry,
    format: OutputFormat,
) -> Result<()> {
    let providers = Arc::new(DefaultProviderFactory::new(config.llm.clone()));
    let mut coordinator = Coordinator::assemble(config, &stores.team_stores(), providers).await?;

    let start = std::time::Instant::now();
    let reply = coordinator.handle(&task).await?;

    match format {
        OutputFormat::Text => println!("{}", reply),
        OutputFormat::Json => print_json(&json!({
            "project": coordinator.project(),
            "task": task,
            "reply": reply,
            "duration_ms": start.elapsed().as_millis() as u64,
        }))?,
    }
    Ok(())
}

/// Interactive coordinator loop on stdin.
///
/// `/reset` starts a new session, `/exit` or end of input quits.
pub async fn handle_chat(config: &Config, stores: &StoreRegistry) -> Result<()> {
    let providers = Arc::new(DefaultProviderFactory::new(config.llm.clone()));
    let mut coordinator = Coordinator::assemble(config, &stores.team_stores(), providers).await?;

    println!("troupe chat for {} (/reset, /exit)", coordinator.project());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                coordinator.reset();
                println!("Session reset.");
                continue;
            }
            _ => {}
        }

        match coordinator.handle(input).await {
            Ok(reply) => println!("{}\n", reply),
            // A failed turn keeps the chat alive; store failures do not
            Err(e) if e.downcast_ref::<crate::llm::LLMError>().is_some() => {
                eprintln!("Error: {:#}\n", e)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn print_goal_tree(goals: &[Goal], depth: usize) {
    for goal in goals {
        println!(
            "{}- [{}] {}  ({})",
            "  ".repeat(depth),
            goal.status(),
            goal.description(),
            goal.id()
        );
        print_goal_tree(goal.sub_goals(), depth + 1);
    }
}

fn print_capability_output(output: CapabilityOutput, format: OutputFormat) -> Result<()> {
    let success = output.success;
    match format {
        OutputFormat::Text => println!("{}", output.to_text()),
        OutputFormat::Json => print_json(&serde_json::Value::Object(output.into_map()))?,
    }
    if !success {
        bail!("Goal operation failed");
    }
    Ok(())
}

pub async fn handle_goals(
    action: GoalAction,
    config: &Config,
    stores: &StoreRegistry,
    format: OutputFormat,
) -> Result<()> {
    let project = config.core.project_key();
    let goals: Arc<dyn GoalStore> = stores.goals();

    match action {
        GoalAction::List => {
            let forest = goals.get_goals(&project).await?;
            match format {
                OutputFormat::Text if forest.is_empty() => println!("No goals for {}", project),
                OutputFormat::Text => print_goal_tree(&forest, 0),
                OutputFormat::Json => print_json(&json!({
                    "project": project,
                    "count": count_goals(&forest),
                    "goals": forest,
                }))?,
            }
        }

        GoalAction::Add {
            description,
            parent,
            status,
        } => {
            let mut input = CapabilityInput::new().with_param("description", json!(description));
            if let Some(parent) = parent {
                input = input.with_param("parent_id", json!(parent));
            }
            if let Some(status) = status {
                input = input.with_param("status", json!(status));
            }
            let output = AddGoalCapability::new(goals, &project).invoke(input).await;
            print_capability_output(output, format)?;
        }

        GoalAction::Status {
            id,
            status,
            propagate,
        } => {
            let input = CapabilityInput::new()
                .with_param("id", json!(id))
                .with_param("status", json!(status))
                .with_param("propagate", json!(propagate));
            let output = UpdateGoalCapability::new(goals, &project).invoke(input).await;
            print_capability_output(output, format)?;
        }

        GoalAction::Remove { id } => {
            let removed = goals.remove_goal(&project, &id).await?;
            match format {
                OutputFormat::Text if removed => println!("Removed goal {}", id),
                OutputFormat::Text => println!("Goal not found: {}", id),
                OutputFormat::Json => print_json(&json!({ "id": id, "removed": removed }))?,
            }
        }

        GoalAction::Report => {
            let forest = goals.get_goals(&project).await?;
            let ranker = StimulusRanker::new(config.goals.pending_limit);
            let report = ranker.report(&forest);
            match format {
                OutputFormat::Text => println!("{}", report),
                OutputFormat::Json => print_json(&json!({
                    "project": project,
                    "pending_limit": ranker.pending_limit(),
                    "report": report,
                }))?,
            }
        }

        GoalAction::Projects => {
            let projects = stores.goals().projects().await?;
            match format {
                OutputFormat::Text if projects.is_empty() => println!("No projects have goals"),
                OutputFormat::Text => {
                    for name in &projects {
                        println!("{}", name);
                    }
                }
                OutputFormat::Json => print_json(&json!({ "projects": projects }))?,
            }
        }

        GoalAction::Import { file, replace } => {
            let document = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let imported = parse_goals(&document);

            let mut forest = if replace {
                Vec::new()
            } else {
                goals.get_goals(&project).await?
            };
            let count = count_goals(&imported);
            forest.extend(imported);
            goals.set_goals(&project, &forest).await?;

            match format {
                OutputFormat::Text => println!("Imported {} goals into {}", count, project),
                OutputFormat::Json => print_json(&json!({
                    "project": project,
                    "imported": count,
                    "replaced": replace,
                }))?,
            }
        }

        GoalAction::Export { output } => {
            let forest = goals.get_goals(&project).await?;
            write_or_print(output.as_deref(), &render_goals(&forest)).await?;
        }
    }
    Ok(())
}

pub async fn handle_log(
    action: LogAction,
    config: &Config,
    stores: &StoreRegistry,
    format: OutputFormat,
) -> Result<()> {
    let project = config.core.project_key();
    let logs = stores.logs();

    match action {
        LogAction::Import { file } => {
            let document = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let count = import_log(logs.as_ref(), &project, &document).await?;
            match format {
                OutputFormat::Text => println!("Imported {} log entries into {}", count, project),
                OutputFormat::Json => {
                    print_json(&json!({ "project": project, "imported": count }))?
                }
            }
        }

        LogAction::Export { output } => {
            let entries = logs.get_entries(&project).await?;
            match (format, output) {
                (OutputFormat::Json, None) => print_json(&json!({
                    "project": project,
                    "entries": entries,
                }))?,
                (_, output) => write_or_print(output.as_deref(), &render_log(&entries)).await?,
            }
        }

        LogAction::Clear => {
            let removed = logs.clear(&project).await?;
            match format {
                OutputFormat::Text => println!("Removed {} log entries from {}", removed, project),
                OutputFormat::Json => {
                    print_json(&json!({ "project": project, "removed": removed }))?
                }
            }
        }
    }
    Ok(())
}

pub async fn handle_role(
    action: RoleAction,
    config: &Config,
    stores: &StoreRegistry,
    format: OutputFormat,
) -> Result<()> {
    let project = config.core.project_key();
    let team = &config.core.team;
    let role_store = stores.roles();
    let resolver = RoleResolver::new(config.llm.clone(), config.roles.clone());

    match action {
        RoleAction::List => {
            let mut rows = Vec::new();
            for spec in RoleSpec::all() {
                let resolved = resolver
                    .resolve(role_store.as_ref(), &project, team, spec.name)
                    .await?;
                rows.push((spec, resolved));
            }
            match format {
                OutputFormat::Text => {
                    for (spec, resolved) in &rows {
                        println!(
                            "{:<12} {:<28} {}",
                            spec.name,
                            resolved,
                            spec.capabilities.join(", ")
                        );
                    }
                }
                OutputFormat::Json => {
                    let roles: Vec<_> = rows
                        .iter()
                        .map(|(spec, resolved)| {
                            json!({
                                "role": spec.name,
                                "provider": resolved.provider,
                                "model": resolved.model_name,
                                "capabilities": spec.capabilities,
                                "delegatable": spec.delegatable,
                            })
                        })
                        .collect();
                    print_json(&json!({ "project": project, "team": team, "roles": roles }))?;
                }
            }
        }

        RoleAction::Show { role } => {
            let spec = RoleSpec::lookup(&role).with_context(|| format!("Unknown role: {}", role))?;
            let stored = role_store.get_role_config(&project, team, spec.name).await?;
            let resolved = resolver
                .resolve(role_store.as_ref(), &project, team, spec.name)
                .await?;
            let source = if stored.is_some() { "stored" } else { "config" };
            match format {
                OutputFormat::Text => {
                    println!("Role:         {}", spec.name);
                    println!("Runs on:      {} ({})", resolved, source);
                    println!("Capabilities: {}", spec.capabilities.join(", "));
                    println!("Delegatable:  {}", spec.delegatable);
                    println!("Instruction:  {}", spec.instruction);
                }
                OutputFormat::Json => print_json(&json!({
                    "role": spec.name,
                    "provider": resolved.provider,
                    "model": resolved.model_name,
                    "source": source,
                    "capabilities": spec.capabilities,
                    "delegatable": spec.delegatable,
                    "instruction": spec.instruction,
                }))?,
            }
        }

        RoleAction::Set {
            role,
            provider,
            model,
        } => {
            let spec = RoleSpec::lookup(&role).with_context(|| format!("Unknown role: {}", role))?;
            let provider: ProviderKind = provider.parse()?;
            let model = model.unwrap_or_else(|| config.llm.model_for(provider));
            let role_config = AgentRoleConfig::new(provider, model);

            role_store
                .set_role_config(&project, team, spec.name, &role_config)
                .await?;
            match format {
                OutputFormat::Text => println!("{} now runs on {}", spec.name, role_config),
                OutputFormat::Json => print_json(&json!({
                    "role": spec.name,
                    "provider": role_config.provider,
                    "model": role_config.model_name,
                }))?,
            }
        }
    }
    Ok(())
}

/// Default denylist plus `[terminal] extra_denylist`
fn configured_gate(config: &Config) -> SecurityGate {
    let mut gate = SecurityGate::new();
    for pattern in &config.terminal.extra_denylist {
        gate.deny_pattern(pattern);
    }
    gate
}

/// Report whether the security gate would let `command` run
pub fn handle_check_command(command: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let gate = configured_gate(config);
    let verdict = gate.check(command);

    match format {
        OutputFormat::Text => match &verdict {
            Ok(()) => println!("allowed: {}", command),
            Err(denial) => println!("denied: {}", denial),
        },
        OutputFormat::Json => print_json(&json!({
            "command": command,
            "allowed": verdict.is_ok(),
            "reason": verdict.as_ref().err().map(|d| d.to_string()),
        }))?,
    }
    Ok(())
}

/// Validate configuration and check dependencies
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is validated when loaded
    checks.push(("Configuration", "Valid".to_string()));
    checks.push((
        "Security gate",
        format!("{} blocked patterns", configured_gate(config).patterns().len()),
    ));

    if config.core.workspace.is_dir() {
        checks.push(("Workspace directory", "Exists".to_string()));
    } else {
        checks.push(("Workspace directory", "Missing".to_string()));
        issues.push(format!(
            "Workspace directory does not exist: {}",
            config.core.workspace.display()
        ));
    }

    let db_path = config.database_path();
    match Database::new(&db_path).await {
        Ok(db) => {
            checks.push(("Database", "OK".to_string()));
            db.close().await.ok();
        }
        Err(e) => {
            checks.push(("Database", "Failed".to_string()));
            issues.push(format!("Cannot open database at {}: {:#}", db_path.display(), e));
        }
    }

    let ollama = OllamaProvider::new(&config.llm.ollama.base_url, &config.llm.ollama.model);
    if ollama.check_health().await {
        checks.push(("Ollama", "Available".to_string()));
    } else {
        checks.push(("Ollama", "Not available".to_string()));
        if config.llm.default_provider == ProviderKind::Ollama {
            issues.push(format!(
                "Ollama is not reachable at {}. Start Ollama or change llm.default_provider.",
                config.llm.ollama.base_url
            ));
        }
    }

    let key_env = &config.llm.openai.api_key_env;
    if std::env::var(key_env).is_ok_and(|k| !k.trim().is_empty()) {
        checks.push(("OpenAI API key", format!("Set ({})", key_env)));
    } else {
        checks.push(("OpenAI API key", format!("Not set ({})", key_env)));
        if config.llm.default_provider == ProviderKind::OpenAI {
            issues.push(format!("{} must be set to use OpenAI", key_env));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("troupe diagnostics");
            println!("==================");
            println!();
            for (name, status) in &checks {
                println!("  {:<22} {}", name, status);
            }
            println!();
            if issues.is_empty() {
                println!("No issues found.");
            } else {
                println!("Issues:");
                for issue in &issues {
                    println!("  - {}", issue);
                }
            }
        }
        OutputFormat::Json => {
            let checks: serde_json::Map<_, _> = checks
                .iter()
                .map(|(name, status)| (name.to_string(), json!(status)))
                .collect();
            print_json(&json!({
                "checks": checks,
                "issues": issues,
                "healthy": issues.is_empty(),
            }))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Config, StoreRegistry) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default_config();
        config.core.workspace = temp.path().to_path_buf();
        config.core.data_dir = temp.path().join("data");
        config.core.project = Some("demo".to_string());
        let stores = StoreRegistry::open(&config.database_path()).await.unwrap();
        (temp, config, stores)
    }

    #[tokio::test]
    async fn test_goal_import_export_and_remove() {
        let (temp, config, stores) = setup().await;
        let doc = temp.path().join("goals.md");
        std::fs::write(&doc, "- Ship v1\n  - [COMPLETED] Auth\n  - Billing\n").unwrap();

        handle_goals(
            GoalAction::Import { file: doc, replace: false },
            &config,
            &stores,
            OutputFormat::Json,
        )
        .await
        .unwrap();

        let out = temp.path().join("out.md");
        handle_goals(
            GoalAction::Export { output: Some(out.clone()) },
            &config,
            &stores,
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "- Ship v1\n  - [COMPLETED] Auth\n  - Billing\n"
        );

        let root = stores.goals().get_goals("demo").await.unwrap()[0].id().to_string();
        handle_goals(GoalAction::Remove { id: root }, &config, &stores, OutputFormat::Json)
            .await
            .unwrap();
        assert!(stores.goals().get_goals("demo").await.unwrap().is_empty());
        stores.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_goal_status_on_missing_goal_fails() {
        let (_temp, config, stores) = setup().await;
        let result = handle_goals(
            GoalAction::Status {
                id: "ghost".to_string(),
                status: "COMPLETED".to_string(),
                propagate: false,
            },
            &config,
            &stores,
            OutputFormat::Json,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_role_set_persists_and_rejects_unknown() {
        let (_temp, config, stores) = setup().await;
        handle_role(
            RoleAction::Set {
                role: "coder".to_string(),
                provider: "openai".to_string(),
                model: None,
            },
            &config,
            &stores,
            OutputFormat::Json,
        )
        .await
        .unwrap();

        let stored = stores
            .roles()
            .get_role_config("demo", "default", "coder")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.provider, ProviderKind::OpenAI);
        assert_eq!(stored.model_name, config.llm.openai.model);

        let bad = handle_role(
            RoleAction::Set {
                role: "coder".to_string(),
                provider: "bard".to_string(),
                model: None,
            },
            &config,
            &stores,
            OutputFormat::Text,
        )
        .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_log_import() {
        let (temp, config, stores) = setup().await;
        let doc = temp.path().join("log.md");
        std::fs::write(&doc, "### USER - t1\nhi\n---\n### CODER - t2\nok\n").unwrap();

        handle_log(LogAction::Import { file: doc }, &config, &stores, OutputFormat::Text)
            .await
            .unwrap();
        assert_eq!(stores.logs().get_entries("demo").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_log_clear_only_touches_current_project() {
        let (temp, config, stores) = setup().await;
        let doc = temp.path().join("log.md");
        std::fs::write(&doc, "### USER - t1\nhi\n").unwrap();
        handle_log(LogAction::Import { file: doc }, &config, &stores, OutputFormat::Text)
            .await
            .unwrap();
        stores
            .logs()
            .append_entry("other", &crate::activity::LogEntry::now("USER", "keep"))
            .await
            .unwrap();

        handle_log(LogAction::Clear, &config, &stores, OutputFormat::Json)
            .await
            .unwrap();
        assert!(stores.logs().get_entries("demo").await.unwrap().is_empty());
        assert_eq!(stores.logs().get_entries("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_goal_projects_and_report() {
        let (_temp, config, stores) = setup().await;
        handle_goals(
            GoalAction::Add {
                description: "Ship v1".to_string(),
                parent: None,
                status: None,
            },
            &config,
            &stores,
            OutputFormat::Text,
        )
        .await
        .unwrap();

        handle_goals(GoalAction::Projects, &config, &stores, OutputFormat::Json)
            .await
            .unwrap();
        handle_goals(GoalAction::Report, &config, &stores, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(stores.goals().projects().await.unwrap(), vec!["demo".to_string()]);
    }

    #[test]
    fn test_configured_gate_adds_extra_patterns() {
        let mut config = Config::default_config();
        let defaults = configured_gate(&config).patterns().len();
        config.terminal.extra_denylist = vec!["Terraform Destroy".to_string()];

        let gate = configured_gate(&config);
        assert_eq!(gate.patterns().len(), defaults + 1);
        assert!(!gate.is_allowed("terraform destroy -auto-approve"));
    }
}
