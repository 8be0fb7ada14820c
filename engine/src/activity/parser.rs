//! Transcript document format
//!
//! ```text
//! ### USER - 2024-05-01T10:00:00Z
//! Please add billing.
//! ---
//! ### CODER - 2024-05-01T10:02:00Z
//! Done.
//! ```
//!
//! Parsing is lenient: unrecognized headers become `UNKNOWN`, and body text
//! outside any open entry is dropped.

use anyhow::Result;
use tracing::{debug, info};

use super::{LogEntry, LogStore, UNKNOWN};

const HEADER_PREFIX: &str = "### ";
const SEPARATOR: &str = "---";

/// Entry being accumulated
struct OpenEntry {
    role: String,
    timestamp: String,
    body: String,
}

impl OpenEntry {
    fn from_header(header: &str) -> Self {
        let (role, timestamp) = header
            .split_once(" - ")
            .map(|(r, t)| (r.trim(), t.trim()))
            .filter(|(r, t)| !r.is_empty() && !t.is_empty())
            .unwrap_or((UNKNOWN, UNKNOWN));
        Self {
            role: role.to_string(),
            timestamp: timestamp.to_string(),
            body: String::new(),
        }
    }

    fn finish(self) -> LogEntry {
        LogEntry::new(self.role, self.body.trim(), self.timestamp)
    }
}

/// Parse a transcript document into entries, in document order.
pub fn parse_log(document: &str) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let mut open: Option<OpenEntry> = None;

    for line in document.lines() {
        if let Some(header) = line.strip_prefix(HEADER_PREFIX) {
            if let Some(entry) = open.take() {
                entries.push(entry.finish());
            }
            open = Some(OpenEntry::from_header(header));
        } else if line.trim() == SEPARATOR {
            if let Some(entry) = open.take() {
                entries.push(entry.finish());
            }
        } else if let Some(entry) = open.as_mut() {
            entry.body.push_str(line);
            entry.body.push('\n');
        } else if !line.trim().is_empty() {
            debug!("Dropping log line outside any entry");
        }
    }

    if let Some(entry) = open.take() {
        entries.push(entry.finish());
    }
    entries
}

/// Parse a transcript and append every entry to `store`.
///
/// Returns the number of entries imported.
pub async fn import_log(store: &dyn LogStore, project: &str, document: &str) -> Result<usize> {
    let entries = parse_log(document);
    for entry in &entries {
        store.append_entry(project, entry).await?;
    }
    info!("Imported {} log entries into {}", entries.len(), project);
    Ok(entries.len())
}

/// Render entries in the transcript format, separated by `---` lines.
pub fn render_log(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}{} - {}\n{}\n", HEADER_PREFIX, e.role, e.timestamp, e.content))
        .collect::<Vec<_>>()
        .join(&format!("{}\n", SEPARATOR))
}
