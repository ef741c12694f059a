//!
//! credstore: the identity and credential store behind a session-based web login.
//!
//! ## Core Concepts
//!
//! * **Users (`user::User`)**: One record per registered identity, keyed by email. Carries the
//!   hashed password, confirmation and recovery selector/verifier pairs, and lockout state.
//! * **Credential Store (`store::CredentialStore`)**: The in-memory index of users and the
//!   remember-token ledger. All reads are served from memory; writes go through to a backend.
//! * **Backends (`backend::UserBackend`)**: The durable relational copy of the users table
//!   (`SqlxBackend` for SQLite/PostgreSQL, `InMemory` for development and tests).
//! * **Lockout Policy (`lockout::LockoutPolicy`)**: Pure rules deciding when repeated failures
//!   suspend authentication, and the only code allowed to advance the attempt counter.
//! * **Tokens (`tokens`)**: Selector/verifier tokens for confirmation and recovery, and
//!   one-time remember-me tokens.
//! * **Flows (`flows`)**: Register, confirm, recover, remember and lock steps built on the store.

pub mod backend;
pub mod clock;
pub mod context;
pub mod flows;
pub mod lockout;
pub mod store;
pub mod tokens;
pub mod user;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use context::{CancelHandle, OpContext};
pub use lockout::LockoutPolicy;
pub use store::{CredentialStore, StoreOptions};
pub use user::{NewUser, User, UserId};

/// Result type used throughout the credstore library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the credstore library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured errors from the credential store
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured errors from a durable backend
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured errors from the authentication flows
    #[error(transparent)]
    Flow(flows::FlowError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Store(_) => "store",
            Error::Backend(_) => "backend",
            Error::Flow(_) => "flows",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates an identity, row or token was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            Error::Backend(backend_err) => backend_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_conflict(),
            Error::Backend(backend_err) => backend_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error came from the durable store.
    pub fn is_persistence_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_persistence_error(),
            Error::Backend(_) => true,
            _ => false,
        }
    }

    /// Check if the operation was cancelled or ran out of time.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error was caused by a bad, expired or already used token.
    pub fn is_token_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_token_error(),
            Error::Flow(flow_err) => flow_err.is_token_error(),
            _ => false,
        }
    }
}
