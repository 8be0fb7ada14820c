//! Goal document renderer, the inverse of `parser::parse_goals`.

use super::parser::is_decorative;
use super::{Goal, GoalStatus};

/// Render a forest as an indented bullet document.
///
/// Two spaces per depth level, a `- ` marker, and a `[STATUS]` token before
/// the description for every goal that is not PENDING. A PENDING goal whose
/// description opens with a marker glyph also gets `[PENDING]`, which keeps
/// the parser from stripping that glyph.
pub fn render_goals(forest: &[Goal]) -> String {
    let mut out = String::new();
    for goal in forest {
        render_goal(goal, 0, &mut out);
    }
    out
}

fn render_goal(goal: &Goal, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str("- ");
    let guarded = goal.description().chars().next().is_some_and(is_decorative);
    if goal.status() != GoalStatus::Pending || guarded {
        out.push_str(&goal.status().token());
        out.push(' ');
    }
    out.push_str(goal.description());
    out.push('\n');

    for child in goal.sub_goals() {
        render_goal(child, depth + 1, out);
    }
}
