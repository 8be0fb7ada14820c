/// Goal forest persistence
///
/// Each project's forest is one JSON document. `set_goals` replaces it with
/// a single upsert, so a write is atomic but two read-modify-write callers
/// can still overwrite each other.
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::unix_now;
use crate::goals::{Goal, GoalStore};

pub struct SqliteGoalStore {
    pool: SqlitePool,
}

impl SqliteGoalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Projects that have a stored forest
    pub async fn projects(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT project FROM goal_forests ORDER BY project")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list goal projects")
    }
}

#[async_trait]
impl GoalStore for SqliteGoalStore {
    async fn get_goals(&self, project: &str) -> Result<Vec<Goal>> {
        let forest: Option<String> =
            sqlx::query_scalar("SELECT forest FROM goal_forests WHERE project = ?")
                .bind(project)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch goal forest")?;

        match forest {
            None => Ok(Vec::new()),
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("Corrupt goal forest for project {}", project)),
        }
    }

    async fn set_goals(&self, project: &str, goals: &[Goal]) -> Result<()> {
        let json = serde_json::to_string(goals).context("Failed to serialize goal forest")?;

        sqlx::query(
            "INSERT INTO goal_forests (project, forest, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(project) DO UPDATE SET
                forest = excluded.forest, updated_at = excluded.updated_at",
        )
        .bind(project)
        .bind(&json)
        .bind(unix_now())
        .execute(&self.pool)
        .await
        .context("Failed to store goal forest")?;

        debug!("Stored {} root goals for {}", goals.len(), project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::goals::GoalStatus;
    use tempfile::TempDir;

    async fn store() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("goals.db")).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_missing_project_is_empty() {
        let (_dir, db) = store().await;
        assert!(db.goals().get_goals("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forest_round_trips_with_nesting() {
        let (_dir, db) = store().await;
        let goals = db.goals();

        let forest = vec![Goal::new("Ship v1").with_sub_goals(vec![
            Goal::new("Auth").with_status(GoalStatus::Completed),
            Goal::new("Billing"),
        ])];
        goals.set_goals("p", &forest).await.unwrap();

        let loaded = goals.get_goals("p").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), forest[0].id());
        assert_eq!(loaded[0].sub_goals()[0].status(), GoalStatus::Completed);
        assert_eq!(goals.projects().await.unwrap(), vec!["p".to_string()]);
    }

    #[tokio::test]
    async fn test_set_replaces_whole_forest() {
        let (_dir, db) = store().await;
        let goals = db.goals();

        goals.add_goal("p", Goal::new("a")).await.unwrap();
        goals.add_goal("p", Goal::new("b")).await.unwrap();
        goals.set_goals("p", &[Goal::new("c")]).await.unwrap();

        let loaded = goals.get_goals("p").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description(), "c");
    }
}
