//! Error types for the credential store.

use std::time::Duration;

use thiserror::Error;

use crate::backend::BackendError;
use crate::user::UserId;

/// Errors returned by [`CredentialStore`](super::CredentialStore) operations.
///
/// Lookup misses, duplicate identities and missing tokens are expected
/// conditions for the calling flow to handle. Persistence failures are
/// surfaced unchanged; the store never retries.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` with an email that is already indexed.
    #[error("Identity already exists: {email}")]
    DuplicateIdentity {
        /// The conflicting email
        email: String,
    },

    /// No record matches the email, selector or identifier.
    #[error("Identity not found: {key}")]
    IdentityNotFound {
        /// The key that was looked up. Selectors are safe to show.
        key: String,
    },

    /// The remember token is unknown or was already used.
    #[error("Remember token not found for {email}")]
    TokenNotFound {
        /// Identity the token was presented for
        email: String,
    },

    /// The durable write failed. The in-memory index already holds the change.
    #[error("Failed to persist {email}")]
    PersistenceFailure {
        /// Identity being saved
        email: String,
        /// What the backend reported
        #[source]
        source: BackendError,
    },

    /// Schema provisioning or a strict bootstrap scan failed.
    #[error("Store failed to start: {reason}")]
    StartupFailure {
        /// Which startup step failed
        reason: String,
        /// What the backend reported
        #[source]
        source: BackendError,
    },

    /// The operation's context was cancelled.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// Name of the interrupted operation
        operation: &'static str,
    },

    /// The operation's deadline passed.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        /// Name of the interrupted operation
        operation: &'static str,
        /// The timeout that elapsed
        after: Duration,
    },

    /// `save` of a record that was never created.
    #[error("User {email} has not been created in this store")]
    NotPersisted {
        /// Email of the record
        email: String,
    },

    /// `save` of a record whose identifier differs from the indexed one.
    #[error("User {email} is indexed as {expected}, record carries {found}")]
    IdentityMismatch {
        /// Email of the record
        email: String,
        /// Identifier held by the index
        expected: UserId,
        /// Identifier on the record being saved
        found: UserId,
    },

    /// The store started without reading the durable table and cannot tell
    /// which identifiers are free.
    #[error("Cannot {operation}: the store started without its durable records")]
    Degraded {
        /// Name of the refused operation
        operation: &'static str,
    },

    /// The record cannot be stored as given.
    #[error("Invalid user record: {reason}")]
    InvalidRecord {
        /// What is wrong with it
        reason: String,
    },
}

impl StoreError {
    /// Check if this error indicates an identity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::IdentityNotFound { .. } | StoreError::NotPersisted { .. }
        )
    }

    /// Check if this error indicates a conflicting identity.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateIdentity { .. } | StoreError::IdentityMismatch { .. }
        ) || matches!(self, StoreError::PersistenceFailure { source, .. } if source.is_conflict())
    }

    /// Check if this error came from the durable store.
    pub fn is_persistence_error(&self) -> bool {
        matches!(
            self,
            StoreError::PersistenceFailure { .. }
                | StoreError::StartupFailure { .. }
                | StoreError::Degraded { .. }
        )
    }

    /// Check if the operation was cancelled or ran out of time.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StoreError::Cancelled { .. } | StoreError::TimedOut { .. }
        )
    }

    /// Check if this error is a rejected remember token.
    pub fn is_token_error(&self) -> bool {
        matches!(self, StoreError::TokenNotFound { .. })
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
