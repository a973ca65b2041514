use time::Duration;

use crate::digest::DigestKey;
use crate::error::Error;
use crate::token::{SigningKey, parse_signing_key_hex};

const DEFAULT_ISSUER: &str = "sessionguard";
const DEFAULT_ACCESS_TTL_SECS: i64 = 60;

/// Token lifecycle configuration.
///
/// Required keys are constructor parameters. Use
/// [`from_env()`](TokenConfig::from_env) for convention-based setup.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub(crate) signing_key: SigningKey,
    pub(crate) digest_key: DigestKey,
    pub(crate) access_ttl: Duration,
    pub(crate) issuer: String,
}

impl TokenConfig {
    #[must_use]
    pub fn new(signing_key: SigningKey, digest_key: DigestKey) -> Self {
        Self {
            signing_key,
            digest_key,
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            issuer: DEFAULT_ISSUER.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `TOKEN_SIGNING_KEY`: hex Ed25519 secret key (64 bytes). Ephemeral if unset.
    /// - `REFRESH_DIGEST_KEY`: hex HMAC key (at least 32 bytes). Ephemeral if unset.
    /// - `ACCESS_TOKEN_TTL_SECS`: access token lifetime (default 60)
    /// - `TOKEN_ISSUER`: `iss` claim (default `sessionguard`)
    ///
    /// Ephemeral keys invalidate every outstanding token and session on restart.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, Error> {
        let signing_key = match std::env::var("TOKEN_SIGNING_KEY") {
            Ok(k) => parse_signing_key_hex(&k)
                .map_err(|e| Error::Config(format!("TOKEN_SIGNING_KEY: {e}")))?,
            Err(_) => {
                tracing::warn!("TOKEN_SIGNING_KEY not set, using an ephemeral signing key");
                SigningKey::generate()?
            }
        };

        let digest_key = match std::env::var("REFRESH_DIGEST_KEY") {
            Ok(k) => DigestKey::from_hex(&k).ok_or_else(|| {
                Error::Config(
                    "REFRESH_DIGEST_KEY is set but invalid (must be hex, at least 32 bytes)"
                        .into(),
                )
            })?,
            Err(_) => {
                tracing::warn!("REFRESH_DIGEST_KEY not set, using an ephemeral digest key");
                DigestKey::generate()
            }
        };

        let mut config = Self::new(signing_key, digest_key);

        if let Ok(ttl) = std::env::var("ACCESS_TOKEN_TTL_SECS") {
            let secs: i64 = ttl
                .parse()
                .map_err(|e| Error::Config(format!("ACCESS_TOKEN_TTL_SECS: {e}")))?;
            if secs <= 0 {
                return Err(Error::Config("ACCESS_TOKEN_TTL_SECS must be positive".into()));
            }
            config = config.with_access_ttl(Duration::seconds(secs));
        }
        if let Ok(issuer) = std::env::var("TOKEN_ISSUER") {
            config = config.with_issuer(issuer);
        }

        Ok(config)
    }

    /// Generate ephemeral keys with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if key generation fails.
    pub fn ephemeral() -> Result<Self, Error> {
        Ok(Self::new(SigningKey::generate()?, DigestKey::generate()))
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    #[must_use]
    pub fn digest_key(&self) -> &DigestKey {
        &self.digest_key
    }
}
