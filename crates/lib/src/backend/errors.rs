//! Error types for the durable backends.
//!
//! Backends report structured errors; the credential store wraps them in
//! `StoreError::PersistenceFailure` or `StoreError::StartupFailure` depending
//! on when they happen.

use thiserror::Error;

use crate::user::UserId;

/// Result type returned by [`UserBackend`](super::UserBackend) operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors that can occur during durable store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// Query, connection or pool failure reported by sqlx.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// What was being attempted, plus the driver message
        reason: String,
        /// The underlying sqlx error, if any
        #[source]
        source: Option<sqlx::Error>,
    },

    /// No row with this identifier.
    #[error("User row not found: {id}")]
    RowNotFound {
        /// The identifier that was looked up
        id: UserId,
    },

    /// A row with this identifier already exists.
    #[error("User row already exists: {id}")]
    DuplicateRow {
        /// The conflicting identifier
        id: UserId,
    },

    /// Another row already uses this email.
    #[error("Email already stored on another row: {email}")]
    DuplicateEmail {
        /// The conflicting email
        email: String,
    },

    /// A record without an identifier was handed to the backend.
    #[error("User {email} has no identifier and cannot be written")]
    MissingId {
        /// Email of the offending record
        email: String,
    },

    /// A stored row could not be turned back into a user record.
    #[error("Corrupt user row {id}: {reason}")]
    CorruptRow {
        /// Raw identifier of the row
        id: i64,
        /// Which column failed and why
        reason: String,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The store cannot be reached right now.
    #[error("Backend unavailable: {reason}")]
    Unavailable {
        /// Description of the outage
        reason: String,
    },
}

impl BackendError {
    /// Check if this error indicates a row was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::RowNotFound { .. })
    }

    /// Check if this error indicates a uniqueness conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BackendError::DuplicateRow { .. } | BackendError::DuplicateEmail { .. }
        )
    }

    /// Check if this error is related to I/O or (de)serialization.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error indicates stored data is inconsistent.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            BackendError::CorruptRow { .. } | BackendError::MissingId { .. }
        )
    }
}

// Conversion from BackendError to the main Error type
impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
