//! Remember-token ledger.
//!
//! Per-identity set of active remember tokens. Each token is usable once;
//! a successful use removes it. The ledger lives in memory only and does not
//! survive a restart.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct RememberLedger {
    tokens: HashMap<String, Vec<String>>,
}

impl RememberLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `token` to the identity's set. Adding a token twice is a no-op.
    pub(crate) fn add(&mut self, email: &str, token: String) {
        let set = self.tokens.entry(email.to_string()).or_default();
        if !set.contains(&token) {
            set.push(token);
        }
    }

    /// Remove `token` from the identity's set, reporting whether it was there.
    pub(crate) fn take(&mut self, email: &str, token: &str) -> bool {
        let Some(set) = self.tokens.get_mut(email) else {
            return false;
        };
        let Some(pos) = set.iter().position(|t| t == token) else {
            return false;
        };
        set.swap_remove(pos);
        if set.is_empty() {
            self.tokens.remove(email);
        }
        true
    }

    /// Forget every token for the identity, returning how many there were.
    pub(crate) fn clear(&mut self, email: &str) -> usize {
        self.tokens.remove(email).map_or(0, |set| set.len())
    }

    pub(crate) fn count(&self, email: &str) -> usize {
        self.tokens.get(email).map_or(0, Vec::len)
    }
}
