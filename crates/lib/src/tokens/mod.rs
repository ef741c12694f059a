//! Token schemes handed to users.
//!
//! - [`SelectorToken`]: selector/verifier pairs for email confirmation and
//!   password recovery. The selector is stored in clear for lookup; only a
//!   hash of the secret half is stored.
//! - [`RememberToken`]: one-time persistent-login tokens. The ledger holds a
//!   hash, the client holds the token.
//!
//! Both use 64/32 bytes from the OS RNG and SHA-512 digests, base64 encoded.

mod remember;
mod selector;

use std::fmt;

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha512};

pub use remember::RememberToken;
pub use selector::SelectorToken;

/// Which flow a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Confirm,
    Recover,
    Remember,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Confirm => write!(f, "confirm"),
            TokenKind::Recover => write!(f, "recover"),
            TokenKind::Remember => write!(f, "remember"),
        }
    }
}

/// Standard base64 of the SHA-512 digest of `bytes`.
fn digest(bytes: &[u8]) -> String {
    Base64::encode_string(&Sha512::digest(bytes))
}
