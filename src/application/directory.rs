//! Process-wide id↔name lookup table.
//!
//! Loaded once at start and reloaded by reset-to-seed, since the reset
//! removes users created after the seed. Misses fall through to the record
//! store and are remembered.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::{UserId, UserRecord};

pub struct UserDirectory {
    users: Arc<dyn UsersRepo>,
    by_id: DashMap<UserId, String>,
    by_name: DashMap<String, UserId>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self {
            users,
            by_id: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Replace the table with the record store's current users.
    pub async fn reload(&self) -> Result<usize, RepoError> {
        let users = self.users.list_users().await?;
        self.by_id.clear();
        self.by_name.clear();
        for user in &users {
            self.remember(user);
        }
        info!(
            target = "warbler::application::directory",
            users = users.len(),
            "user directory loaded"
        );
        Ok(users.len())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub async fn name_of(&self, id: UserId) -> Result<Option<String>, RepoError> {
        if let Some(name) = self.by_id.get(&id).map(|entry| entry.value().clone()) {
            return Ok(Some(name));
        }
        let found = self.users.find_by_id(id).await?;
        Ok(found.map(|user| {
            self.remember(&user);
            user.name
        }))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        if let Some(id) = self.by_name.get(name).map(|entry| *entry.value()) {
            return Ok(Some(UserRecord {
                id,
                name: name.to_string(),
            }));
        }
        let found = self.users.find_by_name(name).await?;
        if let Some(user) = found.as_ref() {
            self.remember(user);
        }
        Ok(found)
    }

    fn remember(&self, user: &UserRecord) {
        self.by_id.insert(user.id, user.name.clone());
        self.by_name.insert(user.name.clone(), user.id);
    }
}
