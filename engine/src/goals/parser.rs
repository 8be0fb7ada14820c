//! Indented goal document parser
//!
//! Turns a human-editable bullet list into a goal forest:
//!
//! ```text
//! - Ship v1
//!   - Backend
//!     - [COMPLETED] Auth
//! ```
//!
//! Parsing never fails. Malformed indentation degrades to a best-effort
//! structure instead of an error.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::{Goal, GoalStatus};

fn status_annotation() -> &'static Regex {
    static STATUS_ANNOTATION: OnceLock<Regex> = OnceLock::new();
    STATUS_ANNOTATION.get_or_init(|| {
        Regex::new(r"(\*\*)?\[(COMPLETED|IN_PROGRESS|FAILED|PENDING)\](\*\*)?")
            .expect("Invalid status annotation pattern")
    })
}

fn status_token() -> &'static Regex {
    static STATUS_TOKEN: OnceLock<Regex> = OnceLock::new();
    STATUS_TOKEN.get_or_init(|| {
        Regex::new(r"\[(COMPLETED|IN_PROGRESS|FAILED|PENDING)\]")
            .expect("Invalid status token pattern")
    })
}

/// Canonical form of a goal description: a single line with collapsed
/// whitespace and no bracketed status tokens (`[FAILED]` becomes `FAILED`),
/// so a rendered document parses back to the same text and status.
pub fn normalize_description(text: &str) -> String {
    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    // Unbracketing can expose a new token, as in `[[FAILED]]`
    while status_token().is_match(&text) {
        text = status_token().replace_all(&text, "$1").into_owned();
    }
    text
}

/// Parse an indented goal document into a forest of root goals.
pub fn parse_goals(document: &str) -> Vec<Goal> {
    let mut roots: Vec<Goal> = Vec::new();
    // Open scopes, outermost first. A goal is attached to its parent when
    // its scope closes, so the stack owns every goal still open.
    let mut stack: Vec<(Goal, usize)> = Vec::new();

    for line in document.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let indent = line.chars().take_while(|c| *c == ' ').count();
        let text = line[indent..].trim_start();
        let text = text
            .strip_prefix("- ")
            .or_else(|| text.strip_prefix("* "))
            .unwrap_or(text);

        let status = detect_status(text);
        let description = clean_description(text);

        while stack.last().is_some_and(|(_, top)| *top >= indent) {
            close_scope(&mut stack, &mut roots);
        }
        stack.push((Goal::new(description).with_status(status), indent));
    }

    while !stack.is_empty() {
        close_scope(&mut stack, &mut roots);
    }

    debug!("Parsed {} root goals", roots.len());
    roots
}

/// Pop the innermost scope and attach it to its parent (or the roots).
fn close_scope(stack: &mut Vec<(Goal, usize)>, roots: &mut Vec<Goal>) {
    if let Some((goal, _)) = stack.pop() {
        match stack.last_mut() {
            Some((parent, _)) => parent.sub_goals.push(goal),
            None => roots.push(goal),
        }
    }
}

/// First status token found, by precedence. Defaults to PENDING.
fn detect_status(text: &str) -> GoalStatus {
    GoalStatus::DETECTION_ORDER
        .into_iter()
        .find(|status| text.contains(&status.token()))
        .unwrap_or_default()
}

fn clean_description(text: &str) -> String {
    let text = text.trim_start();
    let text = match text.chars().next() {
        Some(c) if is_decorative(c) => text
            .strip_prefix(c)
            .unwrap_or(text)
            .trim_start_matches(['\u{FE0F}', '\u{200D}']),
        _ => text,
    };
    let text = status_annotation().replace_all(text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Marker glyphs such as checkmarks, bullets and emoji. Punctuation that
/// commonly opens real text is kept.
pub(crate) fn is_decorative(c: char) -> bool {
    !c.is_alphanumeric()
        && !c.is_whitespace()
        && !matches!(
            c,
            '[' | '(' | '"' | '\'' | '`' | '.' | '/' | '~' | '$' | '#' | '@' | '<' | '_'
        )
}
