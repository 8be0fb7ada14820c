//! Stimulus ranking
//!
//! Compresses a goal forest into a short, priority-ordered report of
//! outstanding work. Only effective leaves are reported: a goal with no
//! children, or whose children are all COMPLETED. Completed goals are never
//! reported or descended into.

use serde::Serialize;

use super::{Goal, GoalStatus};

/// Returned instead of a report when nothing is outstanding.
pub const ALL_COMPLETE: &str = "All goals are complete. No outstanding work.";

/// Separator between ancestor descriptions in a stimulus path
pub const PATH_SEPARATOR: &str = " > ";

/// Default cap on pending items listed in a report
pub const DEFAULT_PENDING_LIMIT: usize = 5;

/// One reportable goal and its ancestor path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StimulusItem {
    pub status: GoalStatus,
    pub path: String,
}

/// Collect outstanding effective leaves, most urgent first.
///
/// Ordering is FAILED, then IN_PROGRESS, then PENDING; traversal order is
/// preserved within a status.
pub fn collect(forest: &[Goal]) -> Vec<StimulusItem> {
    let mut items = Vec::new();
    for goal in forest {
        collect_goal(goal, &mut Vec::new(), &mut items);
    }
    // sort_by_key is stable
    items.sort_by_key(|item| item.status.priority());
    items
}

fn collect_goal<'a>(goal: &'a Goal, path: &mut Vec<&'a str>, items: &mut Vec<StimulusItem>) {
    if goal.status() == GoalStatus::Completed {
        return;
    }

    path.push(goal.description());
    if goal.is_effective_leaf() {
        items.push(StimulusItem {
            status: goal.status(),
            path: path.join(PATH_SEPARATOR),
        });
    } else {
        for child in goal.sub_goals() {
            collect_goal(child, path, items);
        }
    }
    path.pop();
}

/// Renders stimulus reports with a configurable pending cap.
#[derive(Debug, Clone, Copy)]
pub struct StimulusRanker {
    pending_limit: usize,
}

impl StimulusRanker {
    pub fn new(pending_limit: usize) -> Self {
        Self { pending_limit }
    }

    pub fn pending_limit(&self) -> usize {
        self.pending_limit
    }

    /// Build the report for a forest, or `ALL_COMPLETE` if nothing is
    /// outstanding.
    pub fn report(&self, forest: &[Goal]) -> String {
        let items = collect(forest);
        if items.is_empty() {
            return ALL_COMPLETE.to_string();
        }

        let of = |status: GoalStatus| -> Vec<&StimulusItem> {
            items.iter().filter(|i| i.status == status).collect()
        };
        let failed = of(GoalStatus::Failed);
        let in_progress = of(GoalStatus::InProgress);
        let pending = of(GoalStatus::Pending);

        let mut sections = Vec::new();
        if !failed.is_empty() {
            sections.push(section("CRITICAL (failed):", "! ", &failed));
        }
        if !in_progress.is_empty() {
            sections.push(section("FOCUS (in progress):", "> ", &in_progress));
        }
        if !pending.is_empty() {
            let shown = pending.len().min(self.pending_limit);
            let mut upcoming = section("UPCOMING (pending):", "- ", &pending[..shown]);
            if pending.len() > shown {
                upcoming.push_str(&format!("... and {} more pending\n", pending.len() - shown));
            }
            sections.push(upcoming);
        }

        format!("Outstanding goals:\n\n{}", sections.join("\n"))
    }
}

impl Default for StimulusRanker {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_LIMIT)
    }
}

fn section(title: &str, prefix: &str, items: &[&StimulusItem]) -> String {
    let mut out = format!("{}\n", title);
    for item in items {
        out.push_str(prefix);
        out.push_str(&item.path);
        out.push('\n');
    }
    out
}

/// Report with the default pending cap.
pub fn stimulus_report(forest: &[Goal]) -> String {
    StimulusRanker::default().report(forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::parse_goals;

    #[test]
    fn test_collect_reports_effective_leaves() {
        let forest = parse_goals(
            "- Ship v1\n  - Backend\n    - [COMPLETED] Auth\n    - Billing\n  - Frontend\n",
        );
        let items = collect(&forest);
        let paths: Vec<&str> = items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["Ship v1 > Backend > Billing", "Ship v1 > Frontend"]);
    }

    #[test]
    fn test_all_completed_children_make_parent_a_leaf() {
        let forest =
            parse_goals("- [IN_PROGRESS] Release\n  - [COMPLETED] Tag\n  - [COMPLETED] Notes");
        let items = collect(&forest);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "Release");
        assert_eq!(items[0].status, GoalStatus::InProgress);
    }

    #[test]
    fn test_completed_subtree_skipped() {
        let forest = parse_goals("- [COMPLETED] Old\n  - Leftover\n- New");
        let items = collect(&forest);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "New");
    }

    #[test]
    fn test_priority_ordering_is_stable() {
        let forest = parse_goals("- P1\n- [FAILED] F1\n- [IN_PROGRESS] I1\n- P2\n- [FAILED] F2");
        let paths: Vec<String> = collect(&forest).into_iter().map(|i| i.path).collect();
        assert_eq!(paths, vec!["F1", "F2", "I1", "P1", "P2"]);
    }

    #[test]
    fn test_report_sections_in_order() {
        let forest = parse_goals("- Todo\n- [IN_PROGRESS] Doing\n- [FAILED] Broken");
        let report = stimulus_report(&forest);

        let critical = report.find("CRITICAL").unwrap();
        let focus = report.find("FOCUS").unwrap();
        let upcoming = report.find("UPCOMING").unwrap();
        assert!(critical < focus && focus < upcoming);
        assert!(report.contains("! Broken\n"));
        assert!(report.contains("> Doing\n"));
        assert!(report.contains("- Todo\n"));
    }

    #[test]
    fn test_report_omits_empty_sections() {
        let report = stimulus_report(&parse_goals("- Todo"));
        assert!(!report.contains("CRITICAL"));
        assert!(!report.contains("FOCUS"));
        assert!(report.contains("UPCOMING"));
    }

    #[test]
    fn test_pending_truncation() {
        let doc: String = (1..=8).map(|i| format!("- Task {}\n", i)).collect();
        let report = stimulus_report(&parse_goals(&doc));

        assert_eq!(report.matches("\n- Task").count(), 5);
        assert!(report.contains("- Task 5\n"));
        assert!(!report.contains("Task 6"));
        assert!(report.contains("... and 3 more pending"));
    }

    #[test]
    fn test_custom_limit() {
        let doc = "- A\n- B\n- C";
        let report = StimulusRanker::new(1).report(&parse_goals(doc));
        assert!(report.contains("- A\n"));
        assert!(report.contains("... and 2 more pending"));
    }

    #[test]
    fn test_sentinel_for_empty_and_completed() {
        assert_eq!(stimulus_report(&[]), ALL_COMPLETE);
        let done = parse_goals("- [COMPLETED] A\n  - [COMPLETED] B");
        assert_eq!(stimulus_report(&done), ALL_COMPLETE);
    }
}
