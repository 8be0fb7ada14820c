// troupe: goal-tracking coordinator with delegated specialist roles

use clap::Parser;
use sdk::errors::{EngineError, TroupeErrorExt};
use troupe_engine::cli::{Cli, Command};
use troupe_engine::config::Config;
use troupe_engine::db::StoreRegistry;
use troupe_engine::handlers::{
    handle_chat, handle_check_command, handle_doctor, handle_goals, handle_log, handle_role,
    handle_run, OutputFormat,
};
use troupe_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Basic telemetry until the config is loaded
    init_telemetry();

    tracing::info!(
        "troupe v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let result = execute(cli).await;
    if let Err(e) = &result {
        if let Some(engine_error) = e.downcast_ref::<EngineError>() {
            eprintln!("Hint: {}", engine_error.user_hint());
        }
    }
    result
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_create()?,
    };
    if let Some(project) = cli.project {
        config.core.project = Some(project);
    }

    // Only takes effect if RUST_LOG is not set
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    run(cli.command, &config, format).await
}

async fn run(command: Command, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Command::CheckCommand { command } => handle_check_command(&command, config, format),

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(config, format).await
        }

        command => {
            let stores = StoreRegistry::open(&config.database_path()).await?;
            let result = match command {
                Command::Run { task } => {
                    tracing::info!("Executing task: {}", task);
                    handle_run(task, config, &stores, format).await
                }
                Command::Chat => handle_chat(config, &stores).await,
                Command::Goals { action } => handle_goals(action, config, &stores, format).await,
                Command::Log { action } => handle_log(action, config, &stores, format).await,
                Command::Role { action } => handle_role(action, config, &stores, format).await,
                Command::CheckCommand { .. } | Command::Doctor => Ok(()),
            };

            // Checkpoint the WAL even when the command failed
            if let Err(e) = stores.close().await {
                tracing::warn!("Failed to close database cleanly: {:#}", e);
            }
            result
        }
    }
}
