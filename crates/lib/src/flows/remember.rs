//! Remember-me logins.
//!
//! Each token logs in once. A successful login consumes the presented token
//! and issues a replacement.

use crate::{
    CredentialStore, Result, User,
    tokens::{RememberToken, TokenKind},
};

use super::FlowError;

/// Issue a remember token for an existing identity.
///
/// Returns the value to hand to the client.
pub async fn issue(store: &CredentialStore, email: &str) -> Result<String> {
    store.load(email).await?;
    let token = RememberToken::generate(email);
    store.add_remember_token(email, token.ledger_hash()).await;
    Ok(token.client_token())
}

/// Log in with a client's remember token.
///
/// Returns the identity and its replacement token. Fails with
/// `TokenNotFound` if the token was already used or revoked.
pub async fn authenticate(store: &CredentialStore, client_token: &str) -> Result<(User, String)> {
    let token = RememberToken::parse(client_token).ok_or(FlowError::MalformedToken {
        kind: TokenKind::Remember,
    })?;

    store
        .use_remember_token(token.email(), &token.ledger_hash())
        .await?;
    let user = store.load(token.email()).await?;
    let renewed = issue(store, token.email()).await?;
    Ok((user, renewed))
}

/// Log out everywhere.
pub async fn revoke_all(store: &CredentialStore, email: &str) -> usize {
    store.delete_remember_tokens(email).await
}
