//! Lockout bookkeeping around password checks.
//!
//! The caller verifies the password; these helpers run the store's
//! [`LockoutPolicy`](crate::LockoutPolicy) and persist what it decides.

use crate::{CredentialStore, OpContext, Result, User, lockout::FailureOutcome};

use super::FlowError;

/// Refuse to authenticate a locked identity.
pub fn ensure_unlocked(store: &CredentialStore, user: &User) -> Result<()> {
    let now = store.now();
    match crate::LockoutPolicy::locked_until(user.lockout(), now) {
        Some(until) => Err(FlowError::AccountLocked {
            email: user.email().to_string(),
            until,
        }
        .into()),
        None => Ok(()),
    }
}

/// Count a failed password check and persist the result.
///
/// The failure is counted against the current stored record, and `user` is
/// refreshed with it, so parallel failures are all counted.
pub async fn record_failure(
    store: &CredentialStore,
    ctx: &OpContext,
    user: &mut User,
) -> Result<FailureOutcome> {
    let policy = *store.lockout_policy();
    let now = store.now();
    let (updated, outcome) = store
        .update(ctx, user.email(), |current| {
            Ok(policy.register_failure(current, now))
        })
        .await?;
    *user = updated;
    if let FailureOutcome::Locked { until } = outcome {
        tracing::info!(email = %user.email(), %until, "Locked account");
    }
    Ok(outcome)
}

/// Clear the failure count after a successful check. Writes only if the
/// stored record has failures or a lock to clear; `user` is refreshed either
/// way.
pub async fn record_success(store: &CredentialStore, ctx: &OpContext, user: &mut User) -> Result<()> {
    let current = store.load(user.email()).await?;
    let state = current.lockout();
    if state.attempt_count == 0 && state.locked_until.is_none() {
        *user = current;
        return Ok(());
    }

    let policy = *store.lockout_policy();
    let (updated, ()) = store
        .update(ctx, user.email(), |current| {
            policy.reset(current);
            Ok(())
        })
        .await?;
    *user = updated;
    Ok(())
}
