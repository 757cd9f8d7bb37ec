//! User storage
//!
//! Handlers reach users through the [`UserSource`] trait. The bundled
//! [`InMemoryUserStore`] keeps accounts in memory and can be seeded from a
//! JSON fixture file.

use async_trait::async_trait;
use opendata_core::{CoreError, User, UserId};
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a user store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User not found: {0}")]
    NotFound(UserId),

    #[error("User has been deleted: {0}")]
    Deleted(UserId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fixture: {0}")]
    Fixture(#[from] serde_json::Error),
}

/// In-place change applied by [`UserSource::modify`].
pub type UserChange<'a> = Box<dyn FnOnce(&mut User) -> StoreResult<()> + Send + 'a>;

/// Read and write access to user accounts.
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Snapshot of the accounts in insertion order.
    async fn list(&self, include_deleted: bool) -> Vec<User>;

    async fn get(&self, id: &UserId) -> Option<User>;

    async fn get_by_slug(&self, slug: &str) -> Option<User>;

    /// Replace the stored account carrying the same id.
    async fn update(&self, user: User) -> StoreResult<User>;

    /// Apply `change` to the stored account atomically.
    ///
    /// The stored account is left untouched when `change` fails.
    async fn modify<'a>(&self, id: &UserId, change: UserChange<'a>) -> StoreResult<User>;

    async fn count(&self) -> usize {
        self.list(true).await.len()
    }
}

/// In-memory user store
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Load users from a JSON array of accounts.
    #[instrument]
    pub async fn from_fixture(path: &Path) -> StoreResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let mut users: Vec<User> = serde_json::from_str(&raw)?;
        for user in users.iter_mut().filter(|u| u.slug.is_empty()) {
            user.populate_slug();
        }

        info!(count = users.len(), "Loaded user fixture");
        Ok(Self::new(users))
    }
}

#[async_trait]
impl UserSource for InMemoryUserStore {
    async fn list(&self, include_deleted: bool) -> Vec<User> {
        self.users
            .read()
            .await
            .iter()
            .filter(|u| include_deleted || !u.is_deleted())
            .cloned()
            .collect()
    }

    async fn get(&self, id: &UserId) -> Option<User> {
        self.users.read().await.iter().find(|u| &u.id == id).cloned()
    }

    async fn get_by_slug(&self, slug: &str) -> Option<User> {
        self.users.read().await.iter().find(|u| u.slug == slug).cloned()
    }

    async fn update(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::NotFound(user.id))?;

        debug!(user_id = %user.id, "Updating user");
        *slot = user.clone();
        Ok(user)
    }

    async fn modify<'a>(&self, id: &UserId, change: UserChange<'a>) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let slot = users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or(StoreError::NotFound(*id))?;

        let mut draft = slot.clone();
        change(&mut draft)?;

        debug!(user_id = %id, "Modified user");
        *slot = draft.clone();
        Ok(draft)
    }

    async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}
