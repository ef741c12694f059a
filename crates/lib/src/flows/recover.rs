//! Password recovery.
//!
//! A recovery is pending while the record carries a recover selector and its
//! expiry has not passed. Starting a new recovery replaces the old selector.
//! Completing one rotates the password hash and drops every remember token.

use chrono::Duration;

use crate::{
    CredentialStore, OpContext, Result, User,
    store::StoreError,
    tokens::{SelectorToken, TokenKind},
};

use super::FlowError;

/// Default lifetime of a recovery token.
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

/// Start a recovery for `email`, valid for `ttl`.
///
/// Returns the token to send to the user.
pub async fn begin(
    store: &CredentialStore,
    ctx: &OpContext,
    email: &str,
    ttl: Duration,
) -> Result<String> {
    let (token, stored) = SelectorToken::generate();
    let expiry = store.now() + ttl;
    store
        .update(ctx, email, |user| {
            user.recover_selector = Some(stored.selector);
            user.recover_verifier = Some(stored.verifier);
            user.recover_token_expiry = Some(expiry);
            Ok(())
        })
        .await?;
    tracing::debug!(%email, "Started recovery");
    Ok(token)
}

/// Finish the recovery `token` was issued for by setting a new password hash.
///
/// A token works once: the recovery fields are cleared in the same update
/// that sets the password.
pub async fn complete(
    store: &CredentialStore,
    ctx: &OpContext,
    token: &str,
    new_password_hash: impl Into<String>,
) -> Result<User> {
    let presented = SelectorToken::from_user_token(token).ok_or(FlowError::MalformedToken {
        kind: TokenKind::Recover,
    })?;
    let new_password_hash = new_password_hash.into();
    let now = store.now();

    let found = store.load_by_recover_selector(&presented.selector).await?;
    let (user, ()) = store
        .update(ctx, found.email(), |user| {
            if user.recover_selector.as_deref() != Some(presented.selector.as_str()) {
                return Err(StoreError::IdentityNotFound {
                    key: presented.selector.clone(),
                }
                .into());
            }
            let stored = user.recover_verifier.as_deref().unwrap_or_default();
            if !presented.verifies(stored) {
                return Err(FlowError::VerifierMismatch {
                    kind: TokenKind::Recover,
                }
                .into());
            }
            if !user.is_recovery_pending(now) {
                return Err(FlowError::RecoveryExpired {
                    email: user.email().to_string(),
                }
                .into());
            }
            user.password = new_password_hash;
            user.clear_recovery();
            Ok(())
        })
        .await?;

    let revoked = store.delete_remember_tokens(user.email()).await;
    tracing::debug!(email = %user.email(), revoked, "Completed recovery");
    Ok(user)
}
