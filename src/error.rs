use crate::store::StoreError;
use crate::token::TokenError;

/// Outcome taxonomy of the session lifecycle.
///
/// `Unauthorized`, `Expired` and `InvalidToken` are about the presented
/// credentials. The remaining variants are internal faults and must not be
/// echoed back to clients.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Credentials are well-formed but not currently valid.
    #[error("unauthorized")]
    Unauthorized,

    /// Access token is authentic but past its lifetime; refresh is allowed.
    #[error("access token expired")]
    Expired,

    /// Access token is structurally broken or its signature does not verify.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("session store error: {0}")]
    Store(#[source] StoreError),

    #[error("token signing error: {0}")]
    Signing(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures unrelated to the presented credentials.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Signing(_) | Self::Config(_))
    }
}

impl From<TokenError> for Error {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed(msg) => Self::InvalidToken(msg),
            TokenError::Expired => Self::Expired,
            TokenError::Signing(msg) => Self::Signing(msg),
        }
    }
}
