use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::fs;
use std::path::Path;

use crate::errors::{DiscoveryError, Result};

pub struct DatabaseManager {
    pub pool: Pool<Sqlite>,
}

impl DatabaseManager {
    /// Open (creating if needed) the history database at `db_path` and
    /// apply the schema.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        log::info!("Connecting to database at: {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(db_path)
                    .create_if_missing(true),
            )
            .await
            .map_err(|e| DiscoveryError::Database(format!("Failed to connect to database: {}", e)))?;

        let schema = include_str!("schema.sql");

        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&pool).await.map_err(|e| {
                    DiscoveryError::Database(format!(
                        "Failed to execute schema statement '{}': {}",
                        stmt, e
                    ))
                })?;
            }
        }

        Ok(Self { pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let db = DatabaseManager::open(&path).await.unwrap();
        assert!(path.exists());

        let row = sqlx::query("SELECT COUNT(*) AS n FROM play_history")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        let n: i64 = row.get("n");
        assert_eq!(n, 0);

        // Reopening is idempotent.
        drop(db);
        DatabaseManager::open(&path).await.unwrap();
    }
}
