//! Conversation sessions
//!
//! A `Session` is one role's private conversation state. Sessions are never
//! shared: every delegation starts a fresh one, and the coordinator keeps
//! its own across turns.
//!
//! History is trimmed to an approximate token budget. Pinned context (such
//! as the goal report injected at session start) is never trimmed, and a
//! delegated session also keeps its opening user turn: the task itself.

use uuid::Uuid;

use crate::llm::{Message, MessageRole};

/// Default history budget in tokens
pub const DEFAULT_TOKEN_LIMIT: usize = 16_000;

/// Rough estimate: 1 token ≈ 4 characters
const CHARS_PER_TOKEN: usize = 4;

/// Per-message overhead for role and structure
const MESSAGE_OVERHEAD_TOKENS: usize = 10;

/// Messages always kept at the tail, whatever the budget
const MIN_RECENT_MESSAGES: usize = 2;

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    role: String,
    pinned: Vec<Message>,
    history: Vec<Message>,
    token_limit: usize,
    token_count: usize,
    keep_first_turn: bool,
}

impl Session {
    /// New empty session for `role`
    pub fn new(role: impl Into<String>) -> Self {
        Self::with_limit(role, DEFAULT_TOKEN_LIMIT)
    }

    pub fn with_limit(role: impl Into<String>, token_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: role.into(),
            pinned: Vec::new(),
            history: Vec::new(),
            token_limit,
            token_count: 0,
            keep_first_turn: false,
        }
    }

    /// Never trim the first user message out of the history
    pub fn keeping_first_turn(mut self) -> Self {
        self.keep_first_turn = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Add context that stays in front of the history and is never trimmed
    pub fn pin_context(&mut self, content: impl Into<String>) {
        self.pinned.push(Message::system(content));
    }

    pub fn pinned(&self) -> &[Message] {
        &self.pinned
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Append a message, trimming the oldest history when over budget
    pub fn push(&mut self, message: Message) {
        self.token_count += estimate_tokens(&message);
        self.history.push(message);

        if self.token_count > self.token_limit {
            self.trim();
        }
    }

    /// Pinned context followed by the history
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.pinned.iter().chain(self.history.iter())
    }

    /// Index of the oldest message that may be trimmed
    fn trim_start(&self) -> usize {
        let anchored = self.keep_first_turn
            && self
                .history
                .first()
                .is_some_and(|m| m.role == MessageRole::User);
        usize::from(anchored)
    }

    fn trim(&mut self) {
        let start = self.trim_start();
        while self.token_count > self.token_limit
            && self.history.len() > start + MIN_RECENT_MESSAGES
        {
            self.drop_at(start);
        }
        // A tool result is meaningless without the call it answers
        while self.history.len() > start + 1
            && self
                .history
                .get(start)
                .is_some_and(|m| m.role == MessageRole::Tool)
        {
            self.drop_at(start);
        }
    }

    fn drop_at(&mut self, index: usize) {
        let removed = self.history.remove(index);
        self.token_count = self.token_count.saturating_sub(estimate_tokens(&removed));
    }
}

fn estimate_tokens(message: &Message) -> usize {
    let call_chars: usize = message
        .tool_calls
        .iter()
        .map(|c| c.name.len() + c.arguments.len())
        .sum();
    let chars = message.content.len()
        + call_chars
        + message.tool_call_id.as_ref().map_or(0, |id| id.len());
    chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[test]
    fn test_sessions_are_distinct() {
        let a = Session::new("coder");
        let b = Session::new("coder");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.role(), "coder");
    }

    #[test]
    fn test_push_counts_tokens() {
        let mut session = Session::new("coder");
        session.push(Message::user("Hello"));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.token_count(), 12);
    }

    #[test]
    fn test_trim_keeps_pinned_and_recent() {
        let mut session = Session::with_limit("coordinator", 60);
        session.pin_context("Outstanding goals: ...");

        for i in 0..10 {
            session.push(Message::user(format!("message number {} with some padding", i)));
        }

        assert!(session.token_count() <= 60);
        assert_eq!(session.pinned().len(), 1);
        let last = session.history().last().unwrap();
        assert!(last.content.contains("message number 9"));
        assert_eq!(session.messages().count(), session.history().len() + 1);
    }

    #[test]
    fn test_trim_never_leaves_orphan_tool_result() {
        let mut session = Session::with_limit("tester", 45);
        session.push(Message::assistant_tool_call(ToolCall::new(
            "c1",
            "run_command",
            r#"{"command":"cargo test"}"#,
        )));
        session.push(Message::tool_result("ok", "c1"));
        session.push(Message::assistant("All tests pass, nothing else to report here."));
        session.push(Message::user("Thanks"));

        assert_ne!(session.history()[0].role, MessageRole::Tool);
    }

    #[test]
    fn test_oversized_recent_messages_are_kept() {
        let mut session = Session::with_limit("coder", 5);
        session.push(Message::user("a".repeat(400)));
        session.push(Message::assistant("b".repeat(400)));
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_large_tool_output_keeps_delegated_task() {
        let mut session = Session::with_limit("tester", DEFAULT_TOKEN_LIMIT).keeping_first_turn();
        session.push(Message::user("Run the test suite and report failures"));
        session.push(Message::assistant_tool_call(ToolCall::new(
            "c1",
            "run_command",
            r#"{"command":"cargo test"}"#,
        )));
        session.push(Message::tool_result("x".repeat(64 * 1024), "c1"));

        let roles: Vec<MessageRole> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::Tool]
        );

        session.push(Message::assistant("3 failures in parser tests"));
        let history = session.history();
        assert_eq!(history[0].content, "Run the test suite and report failures");
        assert_ne!(history[1].role, MessageRole::Tool);
        assert_eq!(history.last().unwrap().content, "3 failures in parser tests");
    }

    #[test]
    fn test_first_turn_trimmed_without_anchor() {
        let mut session = Session::with_limit("coordinator", 40);
        session.push(Message::user("first request with plenty of padding text"));
        session.push(Message::assistant("reply with plenty of padding text here"));
        session.push(Message::user("second request"));
        assert!(!session
            .history()
            .iter()
            .any(|m| m.content.starts_with("first request")));
    }
}
