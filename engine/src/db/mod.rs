/// Database module for SQLite persistence
///
/// Holds the goal forests, the activity log and role configurations. The
/// database runs in WAL mode; `StoreRegistry` owns the connection for the
/// lifetime of the process and hands out store handles.
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub mod goals;
pub mod logs;
pub mod roles;

pub use goals::SqliteGoalStore;
pub use logs::SqliteLogStore;
pub use roles::SqliteRoleConfigStore;

use crate::coordinator::TeamStores;

/// Seconds since the Unix epoch
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run
    /// migrations.
    ///
    /// SQLite replays any WAL left behind by an unclean shutdown when the
    /// file is reopened.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Migrations are idempotent and run on every open
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL into the main database file
    pub async fn flush_wal(&self) -> Result<()> {
        info!("Flushing WAL to disk");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        debug!("WAL flushed successfully");
        Ok(())
    }

    /// Flush the WAL and close all connections
    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");
        self.flush_wal().await?;
        self.pool.close().await;
        info!("Database connection closed");
        Ok(())
    }

    pub fn goals(&self) -> SqliteGoalStore {
        SqliteGoalStore::new(self.pool.clone())
    }

    pub fn logs(&self) -> SqliteLogStore {
        SqliteLogStore::new(self.pool.clone())
    }

    pub fn roles(&self) -> SqliteRoleConfigStore {
        SqliteRoleConfigStore::new(self.pool.clone())
    }
}

/// Owns the database and the store handles built on it.
///
/// Created once at startup and passed to whatever needs a store; `close`
/// tears it down at shutdown.
pub struct StoreRegistry {
    db: Database,
    goals: Arc<SqliteGoalStore>,
    logs: Arc<SqliteLogStore>,
    roles: Arc<SqliteRoleConfigStore>,
}

impl StoreRegistry {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db = Database::new(db_path).await?;
        Ok(Self {
            goals: Arc::new(db.goals()),
            logs: Arc::new(db.logs()),
            roles: Arc::new(db.roles()),
            db,
        })
    }

    pub fn goals(&self) -> Arc<SqliteGoalStore> {
        Arc::clone(&self.goals)
    }

    pub fn logs(&self) -> Arc<SqliteLogStore> {
        Arc::clone(&self.logs)
    }

    pub fn roles(&self) -> Arc<SqliteRoleConfigStore> {
        Arc::clone(&self.roles)
    }

    /// Store handles as the trait objects the team runs against
    pub fn team_stores(&self) -> TeamStores {
        TeamStores {
            goals: self.goals(),
            logs: self.logs(),
            roles: self.roles(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(self) -> Result<()> {
        self.db.close().await
    }
}
