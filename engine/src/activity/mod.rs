//! Activity log
//!
//! An append-only transcript of who said what in a project: user requests,
//! coordinator replies and each delegation round trip.

pub mod parser;

pub use parser::{import_log, parse_log, render_log};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Role name used when a header cannot be parsed
pub const UNKNOWN: &str = "UNKNOWN";

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(
        role: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Entry stamped with the current time
    pub fn now(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(role, content, Utc::now().to_rfc3339())
    }
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append_entry(&self, project: &str, entry: &LogEntry) -> Result<()>;

    /// Entries for `project` in append order
    async fn get_entries(&self, project: &str) -> Result<Vec<LogEntry>>;
}

/// Process-local log store
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: RwLock<HashMap<String, Vec<LogEntry>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append_entry(&self, project: &str, entry: &LogEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .entry(project.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn get_entries(&self, project: &str) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(project)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_append_order() {
        let store = InMemoryLogStore::new();
        store
            .append_entry("/p", &LogEntry::new("USER", "hi", "t1"))
            .await
            .unwrap();
        store
            .append_entry("/p", &LogEntry::new("COORDINATOR", "hello", "t2"))
            .await
            .unwrap();

        let entries = store.get_entries("/p").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, "USER");
        assert_eq!(entries[1].content, "hello");
        assert!(store.get_entries("/other").await.unwrap().is_empty());
    }

    #[test]
    fn test_now_has_rfc3339_timestamp() {
        let entry = LogEntry::now("USER", "hi");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }
}
