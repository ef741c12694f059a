//! In-memory database backend implementation
//!
//! This module provides an in-memory implementation of the [`UserBackend`]
//! trait, suitable for testing, development, or single-node deployments that
//! snapshot the table to a JSON file.

mod persistence;

use std::any::Any;
use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::backend::{BackendError, BackendResult, UserBackend};
use crate::user::{User, UserId};

/// A users table held in a `BTreeMap` keyed by identifier.
///
/// Enforces the same constraints as the SQL table: unique primary key and
/// unique email.
#[derive(Debug, Default)]
pub struct InMemory {
    /// Rows with read-write lock for concurrent access
    pub(crate) rows: RwLock<BTreeMap<UserId, User>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Read a single row, bypassing the credential store.
    pub async fn get(&self, id: UserId) -> Option<User> {
        self.rows.read().await.get(&id).cloned()
    }

    /// Saves every row to a JSON file.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads rows from a JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemory` table is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

fn require_id(user: &User) -> BackendResult<UserId> {
    user.id().ok_or_else(|| BackendError::MissingId {
        email: user.email().to_string(),
    })
}

fn check_email_free(rows: &BTreeMap<UserId, User>, user: &User, id: UserId) -> BackendResult<()> {
    let taken = rows
        .values()
        .any(|row| row.email() == user.email() && row.id() != Some(id));
    if taken {
        return Err(BackendError::DuplicateEmail {
            email: user.email().to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl UserBackend for InMemory {
    async fn provision_schema(&self) -> BackendResult<()> {
        Ok(())
    }

    async fn select_all(&self) -> BackendResult<Vec<User>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn max_id(&self) -> BackendResult<Option<UserId>> {
        Ok(self.rows.read().await.keys().next_back().copied())
    }

    async fn insert(&self, user: &User) -> BackendResult<()> {
        let id = require_id(user)?;
        let mut rows = self.rows.write().await;
        if rows.contains_key(&id) {
            return Err(BackendError::DuplicateRow { id });
        }
        check_email_free(&rows, user, id)?;
        rows.insert(id, user.clone());
        Ok(())
    }

    async fn update_by_id(&self, user: &User) -> BackendResult<()> {
        let id = require_id(user)?;
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&id) {
            return Err(BackendError::RowNotFound { id });
        }
        check_email_free(&rows, user, id)?;
        rows.insert(id, user.clone());
        Ok(())
    }

    async fn upsert(&self, user: &User) -> BackendResult<()> {
        let id = require_id(user)?;
        let mut rows = self.rows.write().await;
        if rows.get(&id).is_some_and(|row| row.email() != user.email()) {
            return Err(BackendError::DuplicateRow { id });
        }
        check_email_free(&rows, user, id)?;
        rows.insert(id, user.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
