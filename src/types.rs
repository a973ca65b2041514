use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Subject identifier (guid) of an authenticated principal.
///
/// Opaque to this crate: identity provisioning happens elsewhere and the
/// caller supplies the value at login.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Client fingerprint (the `User-Agent` seen at issuance or rotation).
///
/// Refresh tokens are bound to it: a refresh from a different fingerprint
/// terminates the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct ClientFingerprint(pub String);

impl From<&str> for ClientFingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Network origin (client IP) seen at issuance or rotation.
///
/// Only used to signal anomalies, never to deny a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct NetworkOrigin(pub String);

impl From<&str> for NetworkOrigin {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Signed, short-lived access token (PASETO `v4.public`).
#[derive(Debug, Clone, PartialEq, Eq, Display, From, Into)]
pub struct AccessToken(pub String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Refresh token: a bearer secret, single use.
///
/// Never logged. `Debug` is redacted and there is no `Display`; use
/// [`expose`](Self::expose) at the transport boundary.
#[derive(Clone, PartialEq, Eq, From, Into)]
pub struct RefreshToken(String);

impl RefreshToken {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RefreshToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(***)")
    }
}

/// Access/refresh pair returned by login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}
