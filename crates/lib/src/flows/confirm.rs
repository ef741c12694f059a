//! Email confirmation.

use crate::{
    CredentialStore, OpContext, Result, User,
    store::StoreError,
    tokens::{SelectorToken, TokenKind},
};

use super::FlowError;

/// Start a confirmation on `user`, replacing any pending one.
///
/// Returns the token to send. The caller saves the record.
pub fn begin(user: &mut User) -> String {
    let (token, stored) = SelectorToken::generate();
    user.confirmed = false;
    user.confirm_selector = Some(stored.selector);
    user.confirm_verifier = Some(stored.verifier);
    token
}

/// Confirm the identity that `token` was issued to.
pub async fn complete(store: &CredentialStore, ctx: &OpContext, token: &str) -> Result<User> {
    let presented = SelectorToken::from_user_token(token).ok_or(FlowError::MalformedToken {
        kind: TokenKind::Confirm,
    })?;

    let found = store.load_by_confirm_selector(&presented.selector).await?;
    let (user, ()) = store
        .update(ctx, found.email(), |user| {
            // The selector may have been spent or replaced since the lookup
            if user.confirm_selector.as_deref() != Some(presented.selector.as_str()) {
                return Err(StoreError::IdentityNotFound {
                    key: presented.selector.clone(),
                }
                .into());
            }
            let stored = user.confirm_verifier.as_deref().unwrap_or_default();
            if !presented.verifies(stored) {
                return Err(FlowError::VerifierMismatch {
                    kind: TokenKind::Confirm,
                }
                .into());
            }
            user.confirmed = true;
            user.clear_confirmation();
            Ok(())
        })
        .await?;
    tracing::debug!(email = %user.email(), "Confirmed user");
    Ok(user)
}
