//! Keyed one-way digest of refresh tokens.
//!
//! Stores never see a refresh token in plaintext: they persist
//! `HMAC-SHA256(key, token)` and compare digests in constant time.

use hmac::digest::Key;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::types::RefreshToken;

type HmacSha256 = Hmac<Sha256>;

const MIN_KEY_LEN: usize = 32;

/// Process-wide secret keying the refresh-token digest.
///
/// Holds the keyed MAC state; each digest starts from a clone of it.
#[derive(Clone)]
pub struct DigestKey {
    mac: HmacSha256,
}

impl DigestKey {
    /// Generate an ephemeral random key of one SHA-256 block.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Key::<HmacSha256>::default();
        rand::rng().fill(key.as_mut_slice());
        Self {
            mac: <HmacSha256 as Mac>::new(&key),
        }
    }

    /// Build a key from raw bytes.
    ///
    /// Returns `None` when shorter than 32 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_KEY_LEN {
            return None;
        }
        <HmacSha256 as Mac>::new_from_slice(bytes)
            .ok()
            .map(|mac| Self { mac })
    }

    /// Parse a hex-encoded key of at least 32 bytes.
    #[must_use]
    pub fn from_hex(key_hex: &str) -> Option<Self> {
        hex::decode(key_hex.trim())
            .ok()
            .and_then(|b| Self::from_bytes(&b))
    }

    /// Digest a presented refresh token.
    #[must_use]
    pub fn digest(&self, token: &RefreshToken) -> RefreshDigest {
        let mut mac = self.mac.clone();
        mac.update(token.expose().as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        RefreshDigest(out)
    }
}

impl std::fmt::Debug for DigestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DigestKey(***)")
    }
}

/// Comparison digest of a refresh token, as persisted by a session store.
///
/// Equality is constant-time.
#[derive(Clone, Copy, Eq)]
pub struct RefreshDigest([u8; 32]);

impl RefreshDigest {
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest previously produced by [`to_hex`](Self::to_hex).
    #[must_use]
    pub fn from_hex(digest_hex: &str) -> Option<Self> {
        let bytes = hex::decode(digest_hex).ok()?;
        let arr: [u8; 32] = bytes.as_slice().try_into().ok()?;
        Some(Self(arr))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl ConstantTimeEq for RefreshDigest {
    fn ct_eq(&self, other: &Self) -> subtle::Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for RefreshDigest {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl std::fmt::Debug for RefreshDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefreshDigest({}…)", &self.to_hex()[..8])
    }
}
