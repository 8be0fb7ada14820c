//! Goal tracking capabilities
//!
//! `add_goal`, `update_goal` and `goal_report` operate on one project's
//! forest in the goal store. Store failures are logged and reported as
//! error outputs; they never abort the calling conversation.

use async_trait::async_trait;
use sdk::capability::Capability;
use sdk::types::{CapabilityInput, CapabilityOutput};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use super::names;
use crate::goals::{
    find_in_forest_mut, refresh_ancestors, render_goals, Goal, GoalStatus, GoalStore,
    StimulusRanker,
};

fn store_failure(err: anyhow::Error) -> CapabilityOutput {
    error!("Goal store failure: {:#}", err);
    CapabilityOutput::error(format!("Goal store unavailable: {}", err))
}

fn parse_status(input: &CapabilityInput) -> Result<Option<GoalStatus>, CapabilityOutput> {
    match input.param_str_opt("status") {
        None => Ok(None),
        Some(s) => s
            .parse::<GoalStatus>()
            .map(Some)
            .map_err(|e| CapabilityOutput::error(e.to_string())),
    }
}

fn status_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["PENDING", "IN_PROGRESS", "COMPLETED", "FAILED"],
    })
}

pub struct AddGoalCapability {
    store: Arc<dyn GoalStore>,
    project: String,
}

impl AddGoalCapability {
    pub fn new(store: Arc<dyn GoalStore>, project: impl Into<String>) -> Self {
        Self {
            store,
            project: project.into(),
        }
    }
}

#[async_trait]
impl Capability for AddGoalCapability {
    fn name(&self) -> &str {
        names::ADD_GOAL
    }

    fn description(&self) -> &str {
        "Record a new project goal, optionally as a sub-goal of an existing one."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": { "type": "string", "description": "What needs to be done" },
                "parent_id": { "type": "string", "description": "Id of the parent goal" },
                "status": status_schema(),
            },
            "required": ["description"],
        })
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let description = match input.param_str("description") {
            Ok(d) => d,
            Err(e) => return e.into(),
        };
        let status = match parse_status(&input) {
            Ok(s) => s.unwrap_or_default(),
            Err(out) => return out,
        };
        let goal = Goal::new(&description).with_status(status);
        let id = goal.id().to_string();

        let result = match input.param_str_opt("parent_id") {
            None => self.store.add_goal(&self.project, goal).await.map(|_| true),
            Some(parent_id) => {
                let mut forest = match self.store.get_goals(&self.project).await {
                    Ok(f) => f,
                    Err(e) => return store_failure(e),
                };
                match find_in_forest_mut(&mut forest, &parent_id) {
                    Some(parent) => {
                        parent.add_sub_goal(goal);
                        self.store
                            .set_goals(&self.project, &forest)
                            .await
                            .map(|_| true)
                    }
                    None => Ok(false),
                }
            }
        };

        match result {
            Ok(true) => {
                info!("Added goal {} to {}", id, self.project);
                CapabilityOutput::json(json!({ "id": id, "status": status.as_str() }))
            }
            Ok(false) => CapabilityOutput::error(format!(
                "Goal not found: {}",
                input.param_str_opt("parent_id").unwrap_or_default()
            )),
            Err(e) => store_failure(e),
        }
    }
}

pub struct UpdateGoalCapability {
    store: Arc<dyn GoalStore>,
    project: String,
}

impl UpdateGoalCapability {
    pub fn new(store: Arc<dyn GoalStore>, project: impl Into<String>) -> Self {
        Self {
            store,
            project: project.into(),
        }
    }
}

#[async_trait]
impl Capability for UpdateGoalCapability {
    fn name(&self) -> &str {
        names::UPDATE_GOAL
    }

    fn description(&self) -> &str {
        "Change a goal's status and/or description. Set propagate to re-derive parent statuses."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Goal id" },
                "status": status_schema(),
                "description": { "type": "string", "description": "New description" },
                "propagate": { "type": "boolean", "description": "Refresh ancestor statuses" },
            },
            "required": ["id"],
        })
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let id = match input.param_str("id") {
            Ok(id) => id,
            Err(e) => return e.into(),
        };
        let status = match parse_status(&input) {
            Ok(s) => s,
            Err(out) => return out,
        };
        let description = input
            .param_str_opt("description")
            .filter(|d| !d.trim().is_empty());
        if status.is_none() && description.is_none() {
            return CapabilityOutput::error("Nothing to update: give a status or a description");
        }

        let mut forest = match self.store.get_goals(&self.project).await {
            Ok(f) => f,
            Err(e) => return store_failure(e),
        };
        let Some(goal) = find_in_forest_mut(&mut forest, &id) else {
            return CapabilityOutput::error(format!("Goal not found: {}", id));
        };
        if let Some(status) = status {
            goal.set_status(status);
        }
        if let Some(description) = description {
            goal.set_description(&description);
        }
        let new_status = goal.status();

        let refreshed = if input.param_bool_opt("propagate").unwrap_or(false) {
            refresh_ancestors(&mut forest, &id)
        } else {
            0
        };

        if let Err(e) = self.store.set_goals(&self.project, &forest).await {
            return store_failure(e);
        }
        info!("Updated goal {} in {}", id, self.project);
        CapabilityOutput::json(json!({
            "id": id,
            "status": new_status.as_str(),
            "ancestors_updated": refreshed,
        }))
    }
}

pub struct GoalReportCapability {
    store: Arc<dyn GoalStore>,
    project: String,
    ranker: StimulusRanker,
}

impl GoalReportCapability {
    pub fn new(
        store: Arc<dyn GoalStore>,
        project: impl Into<String>,
        ranker: StimulusRanker,
    ) -> Self {
        Self {
            store,
            project: project.into(),
            ranker,
        }
    }
}

#[async_trait]
impl Capability for GoalReportCapability {
    fn name(&self) -> &str {
        names::GOAL_REPORT
    }

    fn description(&self) -> &str {
        "Summarize outstanding goals by priority, or show the full goal tree with ids."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": { "type": "string", "enum": ["summary", "tree"] },
            },
            "required": [],
        })
    }

    async fn invoke(&self, input: CapabilityInput) -> CapabilityOutput {
        let forest = match self.store.get_goals(&self.project).await {
            Ok(f) => f,
            Err(e) => return store_failure(e),
        };

        match input.param_str_opt("format").as_deref() {
            None | Some("summary") => CapabilityOutput::text(self.ranker.report(&forest)),
            Some("tree") => CapabilityOutput::json(json!({
                "document": render_goals(&forest),
                "goals": forest,
            })),
            Some(other) => CapabilityOutput::error(format!(
                "Invalid parameter: format must be 'summary' or 'tree', got '{}'",
                other
            )),
        }
    }
}
