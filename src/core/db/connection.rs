//! Database connection and configuration
//!
//! Handles SQLite connection, PRAGMA configuration, and migrations.

use sqlx::sqlite::SqlitePool;
use std::path::PathBuf;

/// Database handle
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database with tuned settings
    pub async fn connect(path: &std::path::Path) -> Result<Self, sqlx::Error> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                tracing::warn!("Failed to create database directory: {}", e);
                sqlx::Error::Io(e)
            })?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url).await?;

        Self::configure_pragmas(&pool).await?;

        Ok(Database { pool })
    }

    /// Configure SQLite PRAGMA settings
    async fn configure_pragmas(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        // WAL allows the monitor pass and an in-flight scrape to share the file
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(pool)
            .await?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(pool)
            .await?;

        // Cascading deletes (event -> results -> checkpoints) depend on this
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(pool)
            .await?;

        // Wait for locks instead of failing when drainer and scraper collide
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(pool)
            .await?;

        sqlx::query("PRAGMA temp_store = MEMORY")
            .execute(pool)
            .await?;

        tracing::debug!("SQLite pragmas configured (WAL, foreign keys, busy timeout)");
        Ok(())
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Connect to in-memory SQLite database (for testing)
    pub async fn connect_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::configure_pragmas(&pool).await?;
        Ok(Database { pool })
    }

    /// Get reference to the connection pool
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Default database path under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("racefeed")
            .join("racefeed.db")
    }

    /// Create Database from an existing pool (for testing/advanced use cases)
    #[doc(hidden)]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Database { pool }
    }
}
