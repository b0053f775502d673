use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{AllowListStore, AllowedUser, RepositoryError};
use crate::DbPool;

pub struct SqlAllowListStore {
    pool: DbPool,
}

impl SqlAllowListStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AllowListStore for SqlAllowListStore {
    async fn is_allowed(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM allowed_users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

        Ok(count > 0)
    }

    async fn add(&self, user_id: i64, username: Option<&str>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO allowed_users (id, username, added_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(user_id)
        .bind(username)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM allowed_users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<AllowedUser>, RepositoryError> {
        let rows = sqlx::query("SELECT id, username, added_at FROM allowed_users ORDER BY added_at")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let added_at_raw: String = row.get("added_at");
                let added_at = DateTime::parse_from_rfc3339(&added_at_raw)
                    .map_err(|error| {
                        RepositoryError::Decode(format!(
                            "invalid added_at timestamp `{added_at_raw}`: {error}"
                        ))
                    })?
                    .with_timezone(&Utc);

                Ok(AllowedUser { id: row.get("id"), username: row.get("username"), added_at })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SqlAllowListStore;
    use crate::repositories::AllowListStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlAllowListStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlAllowListStore::new(pool)
    }

    #[tokio::test]
    async fn membership_round_trip() {
        let store = store().await;

        assert!(!store.is_allowed(77).await.expect("is_allowed"));
        assert!(store.add(77, Some("dina")).await.expect("add"));
        assert!(store.is_allowed(77).await.expect("is_allowed"));

        let listed = store.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 77);
        assert_eq!(listed[0].username.as_deref(), Some("dina"));

        assert!(store.remove(77).await.expect("remove"));
        assert!(!store.is_allowed(77).await.expect("is_allowed"));
    }

    #[tokio::test]
    async fn duplicate_add_is_reported_not_overwritten() {
        let store = store().await;

        assert!(store.add(5, Some("first")).await.expect("add"));
        assert!(!store.add(5, Some("second")).await.expect("re-add"));

        let listed = store.list().await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn removing_unknown_user_reports_false() {
        let store = store().await;
        assert!(!store.remove(404).await.expect("remove"));
    }
}
