//! Durable backends for the users table
//!
//! This module provides the [`UserBackend`] trait and its implementations.
//!
//! The backend is the authoritative long-lived copy of every user record. The
//! credential store reads it exactly once, at startup, and from then on only
//! writes to it; every lookup is served from the store's in-memory index.

use std::any::Any;

use async_trait::async_trait;

use crate::user::{User, UserId};

pub mod database;
pub mod errors;

pub use errors::{BackendError, BackendResult};

/// Row-level access to the durable users table.
///
/// Connection pooling, SQL dialect and transactions belong entirely to the
/// implementation. All implementations must be `Send` and `Sync` to be shared
/// across request tasks, and implement `Any` to allow downcasting.
///
/// Every record passed in has already been assigned an identifier by the
/// store; implementations reject records without one with
/// [`BackendError::MissingId`].
#[async_trait]
pub trait UserBackend: Send + Sync + Any {
    /// Create the users table (and any bookkeeping tables) if missing.
    ///
    /// Must be idempotent.
    async fn provision_schema(&self) -> BackendResult<()>;

    /// Read every stored user. Used by the bootstrap scan.
    ///
    /// Rows that cannot be decoded are skipped with a warning rather than
    /// failing the scan.
    async fn select_all(&self) -> BackendResult<Vec<User>>;

    /// Highest identifier present in the table, counting rows that
    /// [`select_all`](Self::select_all) skipped. `None` for an empty table.
    async fn max_id(&self) -> BackendResult<Option<UserId>>;

    /// Insert a new row. Fails with [`BackendError::DuplicateRow`] if the
    /// identifier is taken, [`BackendError::DuplicateEmail`] if the email is.
    async fn insert(&self, user: &User) -> BackendResult<()>;

    /// Overwrite the row with the record's identifier. Fails with
    /// [`BackendError::RowNotFound`] if there is none.
    async fn update_by_id(&self, user: &User) -> BackendResult<()>;

    /// Insert the row, or overwrite it if a row with the same identifier and
    /// email exists. A row with the same identifier and a different email is
    /// left untouched and reported as [`BackendError::DuplicateRow`].
    async fn upsert(&self, user: &User) -> BackendResult<()>;

    /// Returns a reference to the backend instance as a `dyn Any`.
    fn as_any(&self) -> &dyn Any;
}
