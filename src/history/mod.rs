//! SQLite-backed consumption history.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use uuid::Uuid;

use crate::dedup::HistoryStore;

/// SQLite bind-parameter budget per statement.
const MAX_BIND_VARS: usize = 500;

pub struct SqliteHistory {
    pool: Pool<Sqlite>,
}

impl SqliteHistory {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Keep only the `cap` most recently consumed distinct ids. Returns the
    /// number of rows removed.
    pub async fn prune(&self, cap: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM play_history
            WHERE item_id NOT IN (
                SELECT item_id FROM play_history
                GROUP BY item_id
                ORDER BY MAX(played_at) DESC, MAX(rowid) DESC
                LIMIT ?
            )
            "#,
        )
        .bind(cap as i64)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            log::info!("Pruned {} history rows (keeping {} ids)", removed, cap);
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM play_history")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM play_history")
            .execute(&self.pool)
            .await?;
        log::info!("Play history cleared");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn recent_ids(&self, limit: usize) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id FROM play_history
            GROUP BY item_id
            ORDER BY MAX(played_at) DESC, MAX(rowid) DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("item_id").map_err(Into::into))
            .collect()
    }

    async fn record(&self, id: &str) -> Result<()> {
        let entry_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query("INSERT INTO play_history (id, item_id, played_at) VALUES (?, ?, ?)")
            .bind(&entry_id)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        log::debug!("Recorded consumption of {}", id);
        Ok(())
    }

    async fn play_counts(&self, ids: &[String]) -> Result<HashMap<String, u32>> {
        let mut counts = HashMap::new();
        for chunk in ids.chunks(MAX_BIND_VARS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT item_id, COUNT(*) AS plays FROM play_history WHERE item_id IN ({}) GROUP BY item_id",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.as_str());
            }
            for row in query.fetch_all(&self.pool).await? {
                let id: String = row.try_get("item_id")?;
                let plays: i64 = row.try_get("plays")?;
                counts.insert(id, plays as u32);
            }
        }
        Ok(counts)
    }
}
