//! Authentication flow steps built on the credential store.
//!
//! Each step that changes an existing record does so through
//! [`CredentialStore::update`], re-checking its token against the current
//! record, so concurrent steps on one identity cannot undo each other. Password hashing, HTTP and cookie transport are
//! the caller's concern: flows take already-hashed passwords and return plain
//! token strings.

pub mod confirm;
mod errors;
pub mod lock;
pub mod recover;
pub mod remember;

pub use errors::FlowError;

use crate::{CredentialStore, NewUser, OpContext, Result, User};

/// Create and persist a new identity with a pending email confirmation.
///
/// Returns the saved record and the confirmation token to send to the user.
pub async fn register(
    store: &CredentialStore,
    ctx: &OpContext,
    new_user: NewUser,
) -> Result<(User, String)> {
    let mut user = store.create(new_user).await?;
    let token = confirm::begin(&mut user);
    store.save(ctx, &user).await?;
    tracing::info!(email = %user.email(), "Registered user");
    Ok((user, token))
}
