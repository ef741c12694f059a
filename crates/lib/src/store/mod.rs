//!
//! The credential store: an in-memory index of user records and remember
//! tokens, written through to a durable [`UserBackend`].
//!
//! All reads are served from memory. The durable table is read exactly once,
//! when the store is opened, and is written on every [`CredentialStore::save`].
//! Saves update memory first and then write the row, so after a failed or
//! cancelled durable write the index is ahead of the table until the next
//! successful save of that record.
//!
//! Only one process may serve a given table; there is no cross-process cache
//! invalidation.

mod bootstrap;
mod errors;
mod index;
mod ledger;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use handle_trait::Handle;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub use errors::StoreError;

use crate::{
    Result,
    backend::UserBackend,
    clock::{Clock, SystemClock},
    context::OpContext,
    lockout::LockoutPolicy,
    user::{User, UserId},
};
use index::UserIndex;
use ledger::RememberLedger;

/// Startup and policy options for [`CredentialStore::open`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Run [`UserBackend::provision_schema`] before the bootstrap scan.
    pub provision_schema: bool,
    /// Fail [`CredentialStore::open`] if the bootstrap scan fails, instead of
    /// starting with an empty index.
    pub strict_bootstrap: bool,
    /// Lockout thresholds used by the auth flows.
    pub lockout: LockoutPolicy,
}

impl StoreOptions {
    pub fn provision_schema(mut self, provision: bool) -> Self {
        self.provision_schema = provision;
        self
    }

    pub fn strict_bootstrap(mut self, strict: bool) -> Self {
        self.strict_bootstrap = strict;
        self
    }

    pub fn lockout(mut self, policy: LockoutPolicy) -> Self {
        self.lockout = policy;
        self
    }
}

#[derive(Debug)]
struct State {
    index: UserIndex,
    ledger: RememberLedger,
}

/// Internal state for CredentialStore
///
/// CredentialStore itself is a cheap-to-clone handle wrapping Arc<StoreInternal>.
struct StoreInternal {
    backend: Arc<dyn UserBackend>,
    clock: Arc<dyn Clock>,
    lockout: LockoutPolicy,
    /// Index and ledger. Readers share, writers are exclusive.
    state: RwLock<State>,
    /// Held for the whole of a save so durable writes land in memory order
    save_order: Mutex<()>,
}

impl std::fmt::Debug for StoreInternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInternal")
            .field("backend", &"<UserBackend>")
            .field("clock", &self.clock)
            .field("lockout", &self.lockout)
            .finish_non_exhaustive()
    }
}

/// Identity and credential store.
///
/// `CredentialStore` is a cheap-to-clone handle; every clone shares the same
/// index, ledger and backend. All operations are safe to call concurrently.
///
/// ## Example
///
/// ```
/// # use credstore::{CredentialStore, NewUser, OpContext, StoreOptions, backend::database::InMemory};
/// # #[tokio::main]
/// # async fn main() -> credstore::Result<()> {
/// let ctx = OpContext::background();
/// let store = CredentialStore::open(Box::new(InMemory::new()), StoreOptions::default(), &ctx).await?;
///
/// let mut user = store.create(NewUser::new("a@x.com").role("User")).await?;
/// user.role = "Administrator".to_string();
/// store.save(&ctx, &user).await?;
///
/// assert_eq!(store.load("a@x.com").await?.role, "Administrator");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Handle)]
pub struct CredentialStore {
    inner: Arc<StoreInternal>,
}

impl CredentialStore {
    /// Open a store over `backend`, building the index from a full scan.
    ///
    /// Provisioning failures are fatal. A failed scan is logged and the store
    /// starts empty, unless [`StoreOptions::strict_bootstrap`] is set.
    /// Cancellation or expiry of `ctx` aborts the open.
    pub async fn open(
        backend: Box<dyn UserBackend>,
        options: StoreOptions,
        ctx: &OpContext,
    ) -> Result<Self> {
        Self::open_impl(backend, options, Arc::new(SystemClock), ctx).await
    }

    /// Open a store with a custom clock.
    #[cfg(any(test, feature = "testing"))]
    pub async fn open_with_clock(
        backend: Box<dyn UserBackend>,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
        ctx: &OpContext,
    ) -> Result<Self> {
        Self::open_impl(backend, options, clock, ctx).await
    }

    async fn open_impl(
        backend: Box<dyn UserBackend>,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
        ctx: &OpContext,
    ) -> Result<Self> {
        let backend: Arc<dyn UserBackend> = Arc::from(backend);
        let index = bootstrap::load_index(backend.as_ref(), &options, ctx).await?;

        let inner = Arc::new(StoreInternal {
            backend,
            clock,
            lockout: options.lockout,
            state: RwLock::new(State {
                index,
                ledger: RememberLedger::new(),
            }),
            save_order: Mutex::new(()),
        });
        Ok(Self { inner })
    }

    /// The durable backend behind this store.
    pub fn backend(&self) -> &dyn UserBackend {
        self.inner.backend.as_ref()
    }

    /// The current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// The lockout thresholds this store was opened with.
    pub fn lockout_policy(&self) -> &LockoutPolicy {
        &self.inner.lockout
    }

    // === Users ===

    /// Register a new identity.
    ///
    /// Assigns a fresh identifier and indexes the record. Nothing is written
    /// to the durable store until the record is [`save`](Self::save)d.
    ///
    /// # Errors
    /// - `DuplicateIdentity` if the email is already indexed
    /// - `InvalidRecord` if the email is empty or the record already has an id
    pub async fn create(&self, user: impl Into<User>) -> Result<User> {
        let user = user.into();
        if let Some(id) = user.id() {
            return Err(StoreError::InvalidRecord {
                reason: format!("record for {} already has identifier {id}", user.email()),
            }
            .into());
        }

        let created = self.inner.state.write().await.index.create(user)?;
        debug!(email = %created.email(), id = ?created.id(), "Created user");
        Ok(created)
    }

    /// Store every attribute of `user`, in memory and then durably.
    ///
    /// The record must have come from [`create`](Self::create) or a load; its
    /// email and identifier must match the indexed record. Saves are
    /// serialized and the last one wins: a copy loaded before another save
    /// overwrites that save's changes. Use [`update`](Self::update) to change
    /// a record that other tasks may be changing too.
    ///
    /// If `ctx` is already cancelled nothing changes; if it is cancelled
    /// during the durable write the in-memory update remains.
    ///
    /// # Errors
    /// - `NotPersisted` / `IdentityMismatch` if the record is not the indexed one
    /// - `PersistenceFailure` if the durable write fails
    /// - `Cancelled` / `TimedOut` from `ctx`
    pub async fn save(&self, ctx: &OpContext, user: &User) -> Result<()> {
        let _order = ctx.run("save", self.inner.save_order.lock()).await?;
        ctx.check("save")?;
        self.write_through(ctx, user).await
    }

    /// Apply `change` to the current record for `email` and save the result.
    ///
    /// The record is read and written while holding the save lock, so no
    /// other save or update can interleave: concurrent updates to one
    /// identity all take effect, in some order. If `change` returns an error
    /// nothing is written and the error is passed through.
    ///
    /// Returns the saved record and whatever `change` returned.
    ///
    /// # Errors
    /// - `IdentityNotFound` if `email` is not indexed
    /// - any error from `change`
    /// - the errors of [`save`](Self::save)
    pub async fn update<T, F>(&self, ctx: &OpContext, email: &str, change: F) -> Result<(User, T)>
    where
        F: FnOnce(&mut User) -> Result<T>,
    {
        let _order = ctx.run("update", self.inner.save_order.lock()).await?;
        ctx.check("update")?;

        let mut user = self.load(email).await?;
        let output = change(&mut user)?;
        self.write_through(ctx, &user).await?;
        Ok((user, output))
    }

    /// Replace the indexed record, then write the row. Callers hold
    /// `save_order`.
    async fn write_through(&self, ctx: &OpContext, user: &User) -> Result<()> {
        self.inner.state.write().await.index.replace(user.clone())?;
        debug!(email = %user.email(), id = ?user.id(), "Saved user in memory");

        match ctx.run("save", self.inner.backend.upsert(user)).await {
            Ok(Ok(())) => {
                debug!(email = %user.email(), "Persisted user");
                Ok(())
            }
            Ok(Err(source)) => {
                warn!(email = %user.email(), error = %source, "Durable write failed, memory is ahead");
                Err(StoreError::PersistenceFailure {
                    email: user.email().to_string(),
                    source,
                }
                .into())
            }
            Err(interrupted) => {
                warn!(email = %user.email(), error = %interrupted, "Durable write interrupted, memory is ahead");
                Err(interrupted.into())
            }
        }
    }

    /// Look up a record by email.
    pub async fn load(&self, email: &str) -> Result<User> {
        debug!(%email, "Loading user");
        let state = self.inner.state.read().await;
        state.index.get(email).cloned().ok_or_else(|| {
            StoreError::IdentityNotFound {
                key: email.to_string(),
            }
            .into()
        })
    }

    /// Look up the record whose pending confirmation uses `selector`.
    pub async fn load_by_confirm_selector(&self, selector: &str) -> Result<User> {
        debug!(%selector, "Loading user by confirm selector");
        let state = self.inner.state.read().await;
        state
            .index
            .by_confirm_selector(selector)
            .cloned()
            .ok_or_else(|| {
                StoreError::IdentityNotFound {
                    key: selector.to_string(),
                }
                .into()
            })
    }

    /// Look up the record whose pending recovery uses `selector`.
    pub async fn load_by_recover_selector(&self, selector: &str) -> Result<User> {
        debug!(%selector, "Loading user by recover selector");
        let state = self.inner.state.read().await;
        state
            .index
            .by_recover_selector(selector)
            .cloned()
            .ok_or_else(|| {
                StoreError::IdentityNotFound {
                    key: selector.to_string(),
                }
                .into()
            })
    }

    /// Look up a record by identifier. Scans the index.
    pub async fn load_by_id(&self, id: UserId) -> Result<User> {
        let state = self.inner.state.read().await;
        state.index.by_id(id).cloned().ok_or_else(|| {
            StoreError::IdentityNotFound {
                key: id.to_string(),
            }
            .into()
        })
    }

    /// Every indexed record, ordered by identifier.
    pub async fn list(&self) -> Vec<User> {
        self.inner.state.read().await.index.list()
    }

    /// Number of indexed records.
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.index.len()
    }

    /// Whether the index is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.index.is_empty()
    }

    // === Remember tokens ===

    /// Add a remember token to the identity's set.
    pub async fn add_remember_token(&self, email: &str, token: impl Into<String>) {
        debug!(%email, "Adding remember token");
        self.inner.state.write().await.ledger.add(email, token.into());
    }

    /// Consume a remember token. A token can be used once.
    ///
    /// # Errors
    /// `TokenNotFound` if the identity has no such token.
    pub async fn use_remember_token(&self, email: &str, token: &str) -> Result<()> {
        debug!(%email, "Using remember token");
        if self.inner.state.write().await.ledger.take(email, token) {
            Ok(())
        } else {
            Err(StoreError::TokenNotFound {
                email: email.to_string(),
            }
            .into())
        }
    }

    /// Drop every remember token for the identity, returning how many there
    /// were. Having none is not an error.
    pub async fn delete_remember_tokens(&self, email: &str) -> usize {
        let removed = self.inner.state.write().await.ledger.clear(email);
        debug!(%email, removed, "Deleted remember tokens");
        removed
    }

    /// Number of active remember tokens for the identity.
    pub async fn remember_token_count(&self, email: &str) -> usize {
        self.inner.state.read().await.ledger.count(email)
    }
}
