//! Error types for the authentication flows.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::tokens::TokenKind;

/// Errors raised by the flow helpers themselves. Store errors (missing
/// identity, unknown remember token, persistence) pass through unchanged.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FlowError {
    /// The presented token could not be decoded.
    #[error("Malformed {kind} token")]
    MalformedToken {
        /// Which flow the token was for
        kind: TokenKind,
    },

    /// The selector matched but the secret half did not.
    #[error("Invalid {kind} token")]
    VerifierMismatch {
        /// Which flow the token was for
        kind: TokenKind,
    },

    /// The recovery token was valid but has expired.
    #[error("Recovery token for {email} has expired")]
    RecoveryExpired {
        /// Identity being recovered
        email: String,
    },

    /// Authentication is suspended by the lockout policy.
    #[error("Account {email} is locked until {until}")]
    AccountLocked {
        /// Locked identity
        email: String,
        /// When the lock lifts
        until: DateTime<Utc>,
    },
}

impl FlowError {
    /// Check if this error is a rejected token.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            FlowError::MalformedToken { .. }
                | FlowError::VerifierMismatch { .. }
                | FlowError::RecoveryExpired { .. }
        )
    }

    /// Check if this error is an account lock.
    pub fn is_locked(&self) -> bool {
        matches!(self, FlowError::AccountLocked { .. })
    }
}

// Conversion from FlowError to the main Error type
impl From<FlowError> for crate::Error {
    fn from(err: FlowError) -> Self {
        crate::Error::Flow(err)
    }
}
