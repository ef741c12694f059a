//! Remember-me tokens.

use base64ct::{Base64, Base64Url, Encoding};
use rand::RngCore;
use rand::rngs::OsRng;

use super::digest;

const SECRET_LEN: usize = 32;

/// A persistent-login token.
///
/// The raw token is `<email>;<base64 of 32 random bytes>`. The client gets it
/// URL-safe base64 encoded; the ledger stores `base64(SHA-512(raw))`.
#[derive(Clone, PartialEq, Eq)]
pub struct RememberToken {
    email: String,
    raw: String,
}

impl RememberToken {
    /// Generate a fresh token for `email`.
    pub fn generate(email: &str) -> Self {
        let mut secret = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        Self {
            email: email.to_string(),
            raw: format!("{email};{}", Base64::encode_string(&secret)),
        }
    }

    /// Decode a token presented by a client.
    ///
    /// Returns `None` unless it is URL-safe base64 of `<email>;<secret>` with
    /// both parts non-empty.
    pub fn parse(client_token: &str) -> Option<Self> {
        let bytes = Base64Url::decode_vec(client_token).ok()?;
        let raw = String::from_utf8(bytes).ok()?;
        let (email, secret) = raw.rsplit_once(';')?;
        if email.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self {
            email: email.to_string(),
            raw,
        })
    }

    /// The identity the token belongs to.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The value to hand to the client.
    pub fn client_token(&self) -> String {
        Base64Url::encode_string(self.raw.as_bytes())
    }

    /// The value kept in the remember-token ledger.
    pub fn ledger_hash(&self) -> String {
        digest(self.raw.as_bytes())
    }
}

impl std::fmt::Debug for RememberToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RememberToken")
            .field("email", &self.email)
            .field("raw", &"<redacted>")
            .finish()
    }
}
