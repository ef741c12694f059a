//! Selector/verifier tokens for confirmation and recovery.

use base64ct::{Base64Url, Encoding};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use super::digest;

const TOKEN_LEN: usize = 64;
const HALF: usize = TOKEN_LEN / 2;

/// The stored halves of a selector/verifier token.
///
/// The selector is `base64(SHA-512(first 32 bytes))` and indexes the pending
/// record; the verifier is `base64(SHA-512(last 32 bytes))` and is compared
/// in constant time.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectorToken {
    pub selector: String,
    pub verifier: String,
}

impl SelectorToken {
    /// Generate a fresh token.
    ///
    /// Returns the URL-safe token to send to the user and the halves to store
    /// on the record.
    pub fn generate() -> (String, Self) {
        let mut raw = [0u8; TOKEN_LEN];
        OsRng.fill_bytes(&mut raw);
        (Base64Url::encode_string(&raw), Self::from_raw(&raw))
    }

    /// Recompute the stored halves from a token presented by a user.
    ///
    /// Returns `None` if the token is not URL-safe base64 of 64 bytes.
    pub fn from_user_token(token: &str) -> Option<Self> {
        let raw = Base64Url::decode_vec(token).ok()?;
        let raw: [u8; TOKEN_LEN] = raw.try_into().ok()?;
        Some(Self::from_raw(&raw))
    }

    fn from_raw(raw: &[u8; TOKEN_LEN]) -> Self {
        Self {
            selector: digest(&raw[..HALF]),
            verifier: digest(&raw[HALF..]),
        }
    }

    /// Whether this token's verifier matches the one stored on a record.
    pub fn verifies(&self, stored_verifier: &str) -> bool {
        self.verifier
            .as_bytes()
            .ct_eq(stored_verifier.as_bytes())
            .into()
    }
}

impl std::fmt::Debug for SelectorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorToken")
            .field("selector", &self.selector)
            .field("verifier", &"<redacted>")
            .finish()
    }
}
