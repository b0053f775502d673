use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{ActivityEntry, ActivityLog, RepositoryError};
use crate::DbPool;

pub struct SqlActivityLog {
    pool: DbPool,
}

impl SqlActivityLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ActivityLog for SqlActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity_log (recorded_at, user_id, username, action, details)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.recorded_at.to_rfc3339())
        .bind(entry.user_id)
        .bind(&entry.username)
        .bind(&entry.action)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT recorded_at, user_id, username, action, details
             FROM activity_log ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = rows
            .into_iter()
            .map(|row| {
                let recorded_at_raw: String = row.get("recorded_at");
                let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_raw)
                    .map_err(|error| {
                        RepositoryError::Decode(format!(
                            "invalid recorded_at timestamp `{recorded_at_raw}`: {error}"
                        ))
                    })?
                    .with_timezone(&Utc);

                Ok(ActivityEntry {
                    recorded_at,
                    user_id: row.get("user_id"),
                    username: row.get("username"),
                    action: row.get("action"),
                    details: row.get("details"),
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        // Oldest first, matching how the operator reads the tail.
        entries.reverse();
        Ok(entries)
    }
}
