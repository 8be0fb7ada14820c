/// Role configuration persistence
///
/// Provider and model are separate columns; the provider column goes
/// through `ProviderKind`'s parser on the way out, so an unknown value is
/// an explicit error rather than a silent default.
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use super::unix_now;
use crate::roles::{AgentRoleConfig, ProviderKind, RoleConfigStore};

pub struct SqliteRoleConfigStore {
    pool: SqlitePool,
}

impl SqliteRoleConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decode(provider: &str, model: String) -> Result<AgentRoleConfig> {
    let provider: ProviderKind = provider
        .parse()
        .with_context(|| format!("Stored role config has unknown provider '{}'", provider))?;
    Ok(AgentRoleConfig::new(provider, model))
}

#[async_trait]
impl RoleConfigStore for SqliteRoleConfigStore {
    async fn get_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
    ) -> Result<Option<AgentRoleConfig>> {
        let row = sqlx::query(
            "SELECT provider, model FROM role_configs WHERE project = ? AND team = ? AND role = ?",
        )
        .bind(project)
        .bind(team)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch role config")?;

        row.map(|r| decode(&r.get::<String, _>("provider"), r.get("model")))
            .transpose()
    }

    async fn set_role_config(
        &self,
        project: &str,
        team: &str,
        role: &str,
        config: &AgentRoleConfig,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO role_configs (project, team, role, provider, model, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(project, team, role) DO UPDATE SET
                provider = excluded.provider, model = excluded.model,
                updated_at = excluded.updated_at",
        )
        .bind(project)
        .bind(team)
        .bind(role)
        .bind(config.provider.as_str())
        .bind(&config.model_name)
        .bind(unix_now())
        .execute(&self.pool)
        .await
        .context("Failed to store role config")?;
        Ok(())
    }

    async fn list_role_configs(
        &self,
        project: &str,
        team: &str,
    ) -> Result<BTreeMap<String, AgentRoleConfig>> {
        let rows = sqlx::query(
            "SELECT role, provider, model FROM role_configs
             WHERE project = ? AND team = ? ORDER BY role",
        )
        .bind(project)
        .bind(team)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list role configs")?;

        rows.into_iter()
            .map(|r| -> Result<(String, AgentRoleConfig)> {
                let config = decode(&r.get::<String, _>("provider"), r.get("model"))?;
                Ok((r.get("role"), config))
            })
            .collect()
    }
}
