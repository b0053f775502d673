//! In-memory store implementations for tests and offline tooling.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;

use super::{ActivityEntry, ActivityLog, AllowListStore, AllowedUser, RepositoryError};

#[derive(Default)]
pub struct InMemoryAllowListStore {
    users: Mutex<BTreeMap<i64, AllowedUser>>,
}

impl InMemoryAllowListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(user_ids: &[i64]) -> Self {
        let store = Self::default();
        {
            let mut users = store.users.lock().expect("allow-list lock");
            for id in user_ids {
                users.insert(*id, AllowedUser { id: *id, username: None, added_at: Utc::now() });
            }
        }
        store
    }
}

#[async_trait::async_trait]
impl AllowListStore for InMemoryAllowListStore {
    async fn is_allowed(&self, user_id: i64) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().expect("allow-list lock").contains_key(&user_id))
    }

    async fn add(&self, user_id: i64, username: Option<&str>) -> Result<bool, RepositoryError> {
        let mut users = self.users.lock().expect("allow-list lock");
        if users.contains_key(&user_id) {
            return Ok(false);
        }
        users.insert(
            user_id,
            AllowedUser { id: user_id, username: username.map(str::to_owned), added_at: Utc::now() },
        );
        Ok(true)
    }

    async fn remove(&self, user_id: i64) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().expect("allow-list lock").remove(&user_id).is_some())
    }

    async fn list(&self) -> Result<Vec<AllowedUser>, RepositoryError> {
        Ok(self.users.lock().expect("allow-list lock").values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().expect("activity-log lock").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.action).collect()
    }
}

#[async_trait::async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError> {
        self.entries.lock().expect("activity-log lock").push(entry);
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let entries = self.entries.lock().expect("activity-log lock");
        let skip = entries.len().saturating_sub(limit as usize);
        Ok(entries[skip..].to_vec())
    }
}
