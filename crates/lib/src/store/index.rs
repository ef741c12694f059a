//! In-memory index of user records.
//!
//! The primary map is keyed by email. Two secondary maps point from the
//! confirmation and recovery selectors back to the owning email, and are kept
//! in step with the primary map on every write. Absent or empty selectors are
//! never indexed.

use std::collections::HashMap;

use crate::user::{User, UserId};

use super::StoreError;

#[derive(Debug)]
pub(crate) struct UserIndex {
    users: HashMap<String, User>,
    by_confirm: HashMap<String, String>,
    by_recover: HashMap<String, String>,
    next_id: UserId,
    /// Cleared when the highest stored identifier could not be read
    ids_known: bool,
}

impl Default for UserIndex {
    fn default() -> Self {
        Self {
            users: HashMap::new(),
            by_confirm: HashMap::new(),
            by_recover: HashMap::new(),
            next_id: UserId::new(1),
            ids_known: true,
        }
    }
}

fn selector(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl UserIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.users.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub(crate) fn get(&self, email: &str) -> Option<&User> {
        self.users.get(email)
    }

    pub(crate) fn by_confirm_selector(&self, selector: &str) -> Option<&User> {
        self.by_confirm
            .get(selector)
            .and_then(|email| self.users.get(email))
    }

    pub(crate) fn by_recover_selector(&self, selector: &str) -> Option<&User> {
        self.by_recover
            .get(selector)
            .and_then(|email| self.users.get(email))
    }

    pub(crate) fn by_id(&self, id: UserId) -> Option<&User> {
        self.users.values().find(|user| user.id() == Some(id))
    }

    /// Every record, ordered by identifier.
    pub(crate) fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|user| user.id());
        users
    }

    /// Index a row read back from the durable store.
    ///
    /// Returns `false` and leaves the index untouched when the email is
    /// already taken. The identifier counter always moves past the row's id,
    /// skipped or not, so ids stay unique.
    pub(crate) fn restore(&mut self, user: User) -> bool {
        if let Some(id) = user.id() {
            self.reserve_through(id);
        }
        if self.users.contains_key(user.email()) {
            return false;
        }
        self.put(user);
        true
    }

    /// Keep identifiers up to and including `id` out of circulation.
    pub(crate) fn reserve_through(&mut self, id: UserId) {
        if id >= self.next_id {
            self.next_id = id.next();
        }
    }

    /// Refuse every later `create`, because the free identifiers are unknown.
    pub(crate) fn refuse_creates(&mut self) {
        self.ids_known = false;
    }

    /// Assign a fresh identifier and index a new record.
    pub(crate) fn create(&mut self, mut user: User) -> Result<User, StoreError> {
        if !self.ids_known {
            return Err(StoreError::Degraded { operation: "create" });
        }
        if user.email().is_empty() {
            return Err(StoreError::InvalidRecord {
                reason: "email must not be empty".to_string(),
            });
        }
        if self.users.contains_key(user.email()) {
            return Err(StoreError::DuplicateIdentity {
                email: user.email().to_string(),
            });
        }

        let id = self.next_id;
        self.next_id = id.next();
        user.assign_id(id);
        self.put(user.clone());
        Ok(user)
    }

    /// Overwrite the indexed record for `user.email()` with `user`.
    ///
    /// The record must already be indexed under the same identifier.
    pub(crate) fn replace(&mut self, user: User) -> Result<(), StoreError> {
        let Some(found) = user.id() else {
            return Err(StoreError::NotPersisted {
                email: user.email().to_string(),
            });
        };
        let Some(existing) = self.users.get(user.email()) else {
            return Err(StoreError::NotPersisted {
                email: user.email().to_string(),
            });
        };
        if let Some(expected) = existing.id()
            && expected != found
        {
            return Err(StoreError::IdentityMismatch {
                email: user.email().to_string(),
                expected,
                found,
            });
        }

        self.put(user);
        Ok(())
    }

    fn put(&mut self, user: User) {
        let email = user.email().to_string();
        if let Some(previous) = self.users.get(&email) {
            unlink(&mut self.by_confirm, selector(&previous.confirm_selector), &email);
            unlink(&mut self.by_recover, selector(&previous.recover_selector), &email);
        }
        if let Some(s) = selector(&user.confirm_selector) {
            self.by_confirm.insert(s.to_string(), email.clone());
        }
        if let Some(s) = selector(&user.recover_selector) {
            self.by_recover.insert(s.to_string(), email.clone());
        }
        self.users.insert(email, user);
    }
}

/// Drop `selector -> email` unless the selector has since been taken over by
/// another identity.
fn unlink(map: &mut HashMap<String, String>, selector: Option<&str>, email: &str) {
    if let Some(s) = selector
        && map.get(s).is_some_and(|owner| owner == email)
    {
        map.remove(s);
    }
}
