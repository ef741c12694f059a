//! Core data types for user records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier of a user record.
///
/// Assigned by the credential store on creation, monotonic, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Failed-attempt bookkeeping used by the lockout policy.
///
/// Persisted and returned verbatim; nothing outside the policy interprets or
/// clamps these values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    /// Consecutive failed authentication attempts inside the current window
    pub attempt_count: u32,
    /// When the most recent failed attempt happened
    pub last_attempt: Option<DateTime<Utc>>,
    /// Authentication is refused until this instant
    pub locked_until: Option<DateTime<Utc>>,
}

/// Registration input for a new identity.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: String,
    /// Already-hashed password credential
    pub password: String,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn password(mut self, password_hash: impl Into<String>) -> Self {
        self.password = password_hash.into();
        self
    }
}

/// One registered identity.
///
/// Stored in the `users` table; the in-memory index keys it by `email`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<UserId>,

    /// Display name
    pub name: String,

    /// Authorization level, e.g. "User" or "Administrator"
    pub role: String,

    email: String,

    /// Opaque hashed password credential. Never logged.
    pub password: String,

    /// Confirmation lookup half, present while confirmation is pending
    pub confirm_selector: Option<String>,
    /// Hash of the secret confirmation half
    pub confirm_verifier: Option<String>,
    pub confirmed: bool,

    lockout: LockoutState,

    /// Recovery lookup half, present while a recovery is pending
    pub recover_selector: Option<String>,
    /// Hash of the secret recovery half
    pub recover_verifier: Option<String>,
    pub recover_token_expiry: Option<DateTime<Utc>>,
}

impl User {
    /// A record that has not been created in a store yet.
    pub fn new(new_user: NewUser) -> Self {
        let NewUser {
            email,
            name,
            role,
            password,
        } = new_user;
        Self {
            id: None,
            name,
            role,
            email,
            password,
            confirm_selector: None,
            confirm_verifier: None,
            confirmed: false,
            lockout: LockoutState::default(),
            recover_selector: None,
            recover_verifier: None,
            recover_token_expiry: None,
        }
    }

    /// Rehydrate a record read back from durable storage.
    ///
    /// This is the only public way to set the identifier and lockout state, and
    /// exists for [`UserBackend`](crate::backend::UserBackend) implementations.
    pub fn restored(mut self, id: UserId, lockout: LockoutState) -> Self {
        self.id = Some(id);
        self.lockout = lockout;
        self
    }

    /// The store-assigned identifier, `None` until created.
    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    /// The unique public identifier (login key).
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn lockout(&self) -> &LockoutState {
        &self.lockout
    }

    pub(crate) fn assign_id(&mut self, id: UserId) {
        self.id = Some(id);
    }

    pub(crate) fn lockout_mut(&mut self) -> &mut LockoutState {
        &mut self.lockout
    }

    /// Whether a confirmation flow is outstanding.
    pub fn is_confirmation_pending(&self) -> bool {
        !self.confirmed && self.confirm_selector.is_some()
    }

    /// Whether a recovery flow is outstanding at `now`.
    pub fn is_recovery_pending(&self, now: DateTime<Utc>) -> bool {
        self.recover_selector.is_some()
            && self.recover_token_expiry.is_some_and(|expiry| now < expiry)
    }

    pub fn clear_confirmation(&mut self) {
        self.confirm_selector = None;
        self.confirm_verifier = None;
    }

    pub fn clear_recovery(&mut self) {
        self.recover_selector = None;
        self.recover_verifier = None;
        self.recover_token_expiry = None;
    }
}

impl From<NewUser> for User {
    fn from(new_user: NewUser) -> Self {
        User::new(new_user)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("confirm_selector", &self.confirm_selector)
            .field("confirm_verifier", &self.confirm_verifier.as_ref().map(|_| "<redacted>"))
            .field("confirmed", &self.confirmed)
            .field("lockout", &self.lockout)
            .field("recover_selector", &self.recover_selector)
            .field("recover_verifier", &self.recover_verifier.as_ref().map(|_| "<redacted>"))
            .field("recover_token_expiry", &self.recover_token_expiry)
            .finish()
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .finish()
    }
}
