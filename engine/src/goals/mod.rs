//! Goal Tracking
//!
//! Hierarchical project goals: the `Goal` tree type, the store contract that
//! persists one forest per project, the indented-document parser/renderer
//! used for human-editable goal files, and the stimulus ranker that turns a
//! forest into a short prioritized report for the coordinator.
//!
//! A `Goal` exclusively owns its `sub_goals`, so a forest can never contain
//! a cycle or a goal shared between two parents.

pub mod parser;
pub mod render;
pub mod stimulus;
pub mod store;

pub use parser::{normalize_description, parse_goals};
pub use render::render_goals;
pub use stimulus::{collect, stimulus_report, StimulusItem, StimulusRanker};
pub use store::{GoalStore, InMemoryGoalStore};

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a goal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl GoalStatus {
    /// All statuses, in the precedence order used when detecting
    /// status tokens in goal documents.
    pub const DETECTION_ORDER: [GoalStatus; 4] = [
        GoalStatus::Completed,
        GoalStatus::InProgress,
        GoalStatus::Failed,
        GoalStatus::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Pending => "PENDING",
            GoalStatus::InProgress => "IN_PROGRESS",
            GoalStatus::Completed => "COMPLETED",
            GoalStatus::Failed => "FAILED",
        }
    }

    /// The `[STATUS]` token form used in goal documents
    pub fn token(&self) -> String {
        format!("[{}]", self.as_str())
    }

    /// Ranking score: lower is more urgent. Completed work is never ranked.
    pub fn priority(&self) -> Option<u8> {
        match self {
            GoalStatus::Failed => Some(1),
            GoalStatus::InProgress => Some(2),
            GoalStatus::Pending => Some(3),
            GoalStatus::Completed => None,
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = EngineError;

    /// Accepts `IN_PROGRESS`, `in_progress`, `in-progress` and `in progress`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "PENDING" => Ok(GoalStatus::Pending),
            "IN_PROGRESS" => Ok(GoalStatus::InProgress),
            "COMPLETED" => Ok(GoalStatus::Completed),
            "FAILED" => Ok(GoalStatus::Failed),
            _ => Err(EngineError::InvalidGoalStatus(s.to_string())),
        }
    }
}

/// One unit of trackable work and its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    id: String,
    description: String,
    #[serde(default)]
    status: GoalStatus,
    #[serde(default)]
    sub_goals: Vec<Goal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new PENDING goal with a fresh id.
    ///
    /// The description is stored in `normalize_description` form.
    pub fn new(description: impl AsRef<str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            description: normalize_description(description.as_ref()),
            status: GoalStatus::Pending,
            sub_goals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set the initial status
    pub fn with_status(mut self, status: GoalStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set the children
    pub fn with_sub_goals(mut self, sub_goals: Vec<Goal>) -> Self {
        self.sub_goals = sub_goals;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> GoalStatus {
        self.status
    }

    pub fn sub_goals(&self) -> &[Goal] {
        &self.sub_goals
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_status(&mut self, status: GoalStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_description(&mut self, description: impl AsRef<str>) {
        self.description = normalize_description(description.as_ref());
        self.touch();
    }

    /// Append a child goal (takes ownership)
    pub fn add_sub_goal(&mut self, goal: Goal) {
        self.sub_goals.push(goal);
        self.touch();
    }

    /// Detach and return the child subtree with the given id, searching
    /// the whole subtree below this goal.
    pub fn remove_descendant(&mut self, id: &str) -> Option<Goal> {
        remove_from(&mut self.sub_goals, id)
    }

    fn touch(&mut self) {
        // Keep updated_at monotonic even when the clock has not advanced
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }

    /// Depth-first search for a goal by id (including self)
    pub fn find(&self, id: &str) -> Option<&Goal> {
        if self.id == id {
            return Some(self);
        }
        self.sub_goals.iter().find_map(|g| g.find(id))
    }

    /// Mutable depth-first search for a goal by id (including self)
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Goal> {
        if self.id == id {
            return Some(self);
        }
        self.sub_goals.iter_mut().find_map(|g| g.find_mut(id))
    }

    /// True when there are no children, or every child is COMPLETED.
    pub fn is_effective_leaf(&self) -> bool {
        self.sub_goals
            .iter()
            .all(|g| g.status == GoalStatus::Completed)
    }

    /// Total number of goals in this subtree (including self)
    pub fn count(&self) -> usize {
        1 + self.sub_goals.iter().map(Goal::count).sum::<usize>()
    }

    /// Status implied by the children; a leaf keeps its own status.
    ///
    /// All children COMPLETED gives COMPLETED, any FAILED gives FAILED, any
    /// progress (IN_PROGRESS or some COMPLETED) gives IN_PROGRESS, otherwise
    /// PENDING.
    pub fn derived_status(&self) -> GoalStatus {
        if self.sub_goals.is_empty() {
            return self.status;
        }
        let statuses: Vec<GoalStatus> = self.sub_goals.iter().map(|g| g.status).collect();
        if statuses.iter().all(|s| *s == GoalStatus::Completed) {
            GoalStatus::Completed
        } else if statuses.contains(&GoalStatus::Failed) {
            GoalStatus::Failed
        } else if statuses
            .iter()
            .any(|s| matches!(s, GoalStatus::InProgress | GoalStatus::Completed))
        {
            GoalStatus::InProgress
        } else {
            GoalStatus::Pending
        }
    }
}

/// Find a goal anywhere in a forest
pub fn find_in_forest<'a>(forest: &'a [Goal], id: &str) -> Option<&'a Goal> {
    forest.iter().find_map(|g| g.find(id))
}

/// Mutable lookup anywhere in a forest
pub fn find_in_forest_mut<'a>(forest: &'a mut [Goal], id: &str) -> Option<&'a mut Goal> {
    forest.iter_mut().find_map(|g| g.find_mut(id))
}

/// Remove a subtree anywhere in a forest, returning it
pub fn remove_from(forest: &mut Vec<Goal>, id: &str) -> Option<Goal> {
    if let Some(pos) = forest.iter().position(|g| g.id == id) {
        return Some(forest.remove(pos));
    }
    forest.iter_mut().find_map(|g| g.remove_descendant(id))
}

/// Total number of goals in a forest
pub fn count_goals(forest: &[Goal]) -> usize {
    forest.iter().map(Goal::count).sum()
}

/// Index path from a root to the goal with `id`
fn path_to(forest: &[Goal], id: &str) -> Option<Vec<usize>> {
    for (i, goal) in forest.iter().enumerate() {
        if goal.id == id {
            return Some(vec![i]);
        }
        if let Some(mut rest) = path_to(&goal.sub_goals, id) {
            rest.insert(0, i);
            return Some(rest);
        }
    }
    None
}

/// Re-derive the status of every ancestor of `id`, nearest first.
///
/// Returns the number of ancestors whose status changed.
pub fn refresh_ancestors(forest: &mut [Goal], id: &str) -> usize {
    let Some(path) = path_to(forest, id) else {
        return 0;
    };
    let mut changed = 0;
    // Ancestors are every proper prefix of the path, deepest first
    for depth in (1..path.len()).rev() {
        let Some(ancestor) = goal_at_mut(forest, &path[..depth]) else {
            break;
        };
        let derived = ancestor.derived_status();
        if derived != ancestor.status {
            ancestor.set_status(derived);
            changed += 1;
        }
    }
    changed
}

fn goal_at_mut<'a>(forest: &'a mut [Goal], path: &[usize]) -> Option<&'a mut Goal> {
    let (first, rest) = path.split_first()?;
    let mut current = forest.get_mut(*first)?;
    for idx in rest {
        current = current.sub_goals.get_mut(*idx)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forest() -> Vec<Goal> {
        vec![Goal::new("Ship v1").with_sub_goals(vec![
            Goal::new("Backend").with_sub_goals(vec![
                Goal::new("Auth").with_status(GoalStatus::Completed),
                Goal::new("Billing"),
            ]),
            Goal::new("Frontend"),
        ])]
    }

    #[test]
    fn test_new_goal_defaults() {
        let goal = Goal::new("Write docs");
        assert_eq!(goal.status(), GoalStatus::Pending);
        assert!(goal.sub_goals().is_empty());
        assert_eq!(goal.created_at(), goal.updated_at());
        assert!(!goal.id().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Goal::new("a").id(), Goal::new("a").id());
    }

    #[test]
    fn test_mutation_bumps_updated_at() {
        let mut goal = Goal::new("Write docs");
        let before = goal.updated_at();
        goal.set_status(GoalStatus::InProgress);
        assert!(goal.updated_at() > before);

        let before = goal.updated_at();
        goal.set_description("Write better docs");
        assert!(goal.updated_at() > before);
        assert_eq!(goal.description(), "Write better docs");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("in-progress".parse::<GoalStatus>().unwrap(), GoalStatus::InProgress);
        assert_eq!("COMPLETED".parse::<GoalStatus>().unwrap(), GoalStatus::Completed);
        assert_eq!(" failed ".parse::<GoalStatus>().unwrap(), GoalStatus::Failed);
        assert!("DONE".parse::<GoalStatus>().is_err());
    }

    #[test]
    fn test_status_serde_form() {
        let json = serde_json::to_string(&GoalStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_find_in_forest() {
        let mut forest = sample_forest();
        let billing_id = forest[0].sub_goals()[0].sub_goals()[1].id().to_string();

        assert_eq!(
            find_in_forest(&forest, &billing_id).map(|g| g.description()),
            Some("Billing")
        );

        find_in_forest_mut(&mut forest, &billing_id)
            .unwrap()
            .set_status(GoalStatus::Failed);
        assert_eq!(
            find_in_forest(&forest, &billing_id).unwrap().status(),
            GoalStatus::Failed
        );
        assert!(find_in_forest(&forest, "missing").is_none());
    }

    #[test]
    fn test_effective_leaf() {
        let forest = sample_forest();
        let backend = &forest[0].sub_goals()[0];
        assert!(!backend.is_effective_leaf());

        let done_parent = Goal::new("Parent")
            .with_sub_goals(vec![Goal::new("Child").with_status(GoalStatus::Completed)]);
        assert!(done_parent.is_effective_leaf());
        assert!(Goal::new("Leaf").is_effective_leaf());
    }

    #[test]
    fn test_derived_status() {
        let forest = sample_forest();
        assert_eq!(forest[0].sub_goals()[0].derived_status(), GoalStatus::InProgress);

        let failed = Goal::new("p").with_sub_goals(vec![
            Goal::new("a").with_status(GoalStatus::Failed),
            Goal::new("b").with_status(GoalStatus::Completed),
        ]);
        assert_eq!(failed.derived_status(), GoalStatus::Failed);

        let pending = Goal::new("p").with_sub_goals(vec![Goal::new("a"), Goal::new("b")]);
        assert_eq!(pending.derived_status(), GoalStatus::Pending);
    }

    #[test]
    fn test_refresh_ancestors() {
        let mut forest = sample_forest();
        let billing_id = forest[0].sub_goals()[0].sub_goals()[1].id().to_string();
        let frontend_id = forest[0].sub_goals()[1].id().to_string();

        find_in_forest_mut(&mut forest, &billing_id)
            .unwrap()
            .set_status(GoalStatus::Completed);
        // Backend -> COMPLETED, Ship v1 -> IN_PROGRESS
        assert_eq!(refresh_ancestors(&mut forest, &billing_id), 2);
        assert_eq!(forest[0].sub_goals()[0].status(), GoalStatus::Completed);
        assert_eq!(forest[0].status(), GoalStatus::InProgress);

        find_in_forest_mut(&mut forest, &frontend_id)
            .unwrap()
            .set_status(GoalStatus::Completed);
        refresh_ancestors(&mut forest, &frontend_id);
        assert_eq!(forest[0].status(), GoalStatus::Completed);
    }

    #[test]
    fn test_remove_from_forest() {
        let mut forest = sample_forest();
        assert_eq!(count_goals(&forest), 5);

        let backend_id = forest[0].sub_goals()[0].id().to_string();
        let removed = remove_from(&mut forest, &backend_id).unwrap();
        assert_eq!(removed.description(), "Backend");
        assert_eq!(count_goals(&forest), 2);
        assert!(remove_from(&mut forest, "missing").is_none());
    }

    #[test]
    fn test_goal_serde_round_trip() {
        let forest = sample_forest();
        let json = serde_json::to_string(&forest).unwrap();
        let parsed: Vec<Goal> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, forest);
    }
}
