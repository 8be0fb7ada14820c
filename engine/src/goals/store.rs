//! Goal store contract
//!
//! One forest per project key. `set_goals` is the only persistence
//! primitive: the other mutations are read-modify-write over the whole
//! forest and are not guarded against concurrent writers, so two callers
//! mutating the same project can lose an update.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{remove_from, Goal};

#[async_trait]
pub trait GoalStore: Send + Sync {
    /// The forest for `project`, empty when nothing has been recorded
    async fn get_goals(&self, project: &str) -> Result<Vec<Goal>>;

    /// Atomically replace the forest for `project`
    async fn set_goals(&self, project: &str, goals: &[Goal]) -> Result<()>;

    /// Append a root goal
    async fn add_goal(&self, project: &str, goal: Goal) -> Result<()> {
        let mut goals = self.get_goals(project).await?;
        goals.push(goal);
        self.set_goals(project, &goals).await
    }

    /// Replace the root goal with the same id.
    ///
    /// Returns `false` and leaves the forest untouched when no root has
    /// that id.
    async fn update_goal(&self, project: &str, goal: Goal) -> Result<bool> {
        let mut goals = self.get_goals(project).await?;
        let Some(slot) = goals.iter_mut().find(|g| g.id() == goal.id()) else {
            debug!("update_goal: no root goal {} in {}", goal.id(), project);
            return Ok(false);
        };
        *slot = goal;
        self.set_goals(project, &goals).await?;
        Ok(true)
    }

    /// Remove the goal with `id` (and its subtree) anywhere in the forest
    async fn remove_goal(&self, project: &str, id: &str) -> Result<bool> {
        let mut goals = self.get_goals(project).await?;
        if remove_from(&mut goals, id).is_none() {
            return Ok(false);
        }
        self.set_goals(project, &goals).await?;
        Ok(true)
    }
}

/// Process-local goal store
#[derive(Debug, Default)]
pub struct InMemoryGoalStore {
    forests: RwLock<HashMap<String, Vec<Goal>>>,
}

impl InMemoryGoalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GoalStore for InMemoryGoalStore {
    async fn get_goals(&self, project: &str) -> Result<Vec<Goal>> {
        Ok(self
            .forests
            .read()
            .await
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_goals(&self, project: &str, goals: &[Goal]) -> Result<()> {
        self.forests
            .write()
            .await
            .insert(project.to_string(), goals.to_vec());
        Ok(())
    }
}
