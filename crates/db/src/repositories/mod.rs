use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod activity_log;
pub mod allow_list;
pub mod memory;

pub use activity_log::SqlActivityLog;
pub use allow_list::SqlAllowListStore;
pub use memory::{InMemoryActivityLog, InMemoryAllowListStore};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedUser {
    pub id: i64,
    pub username: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEntry {
    pub recorded_at: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub details: String,
}

/// The permitted-user set shared by both bot processes and the CLI.
/// Mutations are row-level upserts/deletes, never whole-file rewrites.
#[async_trait]
pub trait AllowListStore: Send + Sync {
    async fn is_allowed(&self, user_id: i64) -> Result<bool, RepositoryError>;
    async fn add(&self, user_id: i64, username: Option<&str>) -> Result<bool, RepositoryError>;
    async fn remove(&self, user_id: i64) -> Result<bool, RepositoryError>;
    async fn list(&self) -> Result<Vec<AllowedUser>, RepositoryError>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError>;
    async fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, RepositoryError>;
}
