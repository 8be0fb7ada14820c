/// Activity log persistence
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::unix_now;
use crate::activity::{LogEntry, LogStore};

pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Drop every entry for `project`, returning how many were removed
    pub async fn clear(&self, project: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM activity_log WHERE project = ?")
            .bind(project)
            .execute(&self.pool)
            .await
            .context("Failed to clear activity log")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn append_entry(&self, project: &str, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity_log (project, role, content, timestamp, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project)
        .bind(&entry.role)
        .bind(&entry.content)
        .bind(&entry.timestamp)
        .bind(unix_now())
        .execute(&self.pool)
        .await
        .context("Failed to append activity log entry")?;
        Ok(())
    }

    async fn get_entries(&self, project: &str) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT role, content, timestamp FROM activity_log WHERE project = ? ORDER BY id ASC",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch activity log")?;

        Ok(rows
            .into_iter()
            .map(|r| {
                LogEntry::new(
                    r.get::<String, _>("role"),
                    r.get::<String, _>("content"),
                    r.get::<String, _>("timestamp"),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::import_log;
    use crate::db::Database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_entries_keep_append_order_per_project() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("log.db")).await.unwrap();
        let logs = db.logs();

        logs.append_entry("a", &LogEntry::new("USER", "first", "t1")).await.unwrap();
        logs.append_entry("b", &LogEntry::new("USER", "other", "t2")).await.unwrap();
        logs.append_entry("a", &LogEntry::new("CODER", "second", "t3")).await.unwrap();

        let entries = logs.get_entries("a").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "first");
        assert_eq!(entries[1].role, "CODER");

        assert_eq!(logs.clear("a").await.unwrap(), 2);
        assert_eq!(logs.get_entries("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_into_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("log.db")).await.unwrap();
        let logs = db.logs();

        let doc = "### USER - 2024-01-01\nhello\n---\n### CODER - 2024-01-02\ndone\n";
        assert_eq!(import_log(&logs, "p", doc).await.unwrap(), 2);
        assert_eq!(logs.get_entries("p").await.unwrap()[1].content, "done");
    }
}
