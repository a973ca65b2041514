use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pasetors::Public;
use pasetors::keys::{AsymmetricKeyPair, AsymmetricPublicKey, AsymmetricSecretKey, Generate};
use pasetors::token::UntrustedToken;
use pasetors::version4::{PublicToken, V4};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};
use ulid::Ulid;

use crate::types::{AccessToken, RefreshToken, SubjectId};

const TOKEN_PREFIX: &str = "v4.public.";

/// Errors produced by the token codec.
///
/// `Expired` is only returned by [`TokenCodec::verify`]; [`TokenCodec::parse`]
/// reports expiry through [`ParsedToken::expired`] so the subject of an
/// expired token can still be recovered.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Ed25519 secret key (64 bytes: seed followed by the public key).
#[derive(Clone)]
pub struct SigningKey {
    bytes: [u8; 64],
}

impl SigningKey {
    /// Generate a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the key pair cannot be generated.
    pub fn generate() -> Result<Self, TokenError> {
        let pair = AsymmetricKeyPair::<V4>::generate()
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Self::from_slice(pair.secret.as_bytes())
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            TokenError::Signing(format!(
                "invalid key length: expected 64, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Hex-encoded public half, for out-of-process verifiers.
    #[must_use]
    pub fn verifying_key_hex(&self) -> String {
        hex::encode(&self.bytes[32..])
    }

    fn secret(&self) -> Result<AsymmetricSecretKey<V4>, TokenError> {
        AsymmetricSecretKey::<V4>::from(&self.bytes[..])
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn public(&self) -> Result<AsymmetricPublicKey<V4>, TokenError> {
        AsymmetricPublicKey::<V4>::from(&self.bytes[32..])
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.verifying_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parses a hex-encoded Ed25519 secret key (64 bytes) into a `SigningKey`.
///
/// # Errors
///
/// Returns `TokenError::Signing` if the hex is invalid or the key length is not 64 bytes.
pub fn parse_signing_key_hex(secret_key_hex: &str) -> Result<SigningKey, TokenError> {
    let bytes = hex::decode(secret_key_hex.trim())
        .map_err(|e| TokenError::Signing(format!("invalid hex: {e}")))?;
    let key = SigningKey::from_slice(&bytes)?;
    // fail at load time rather than on first issue
    key.secret()?;
    Ok(key)
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: SubjectId,
    pub iss: String,
    pub jti: Ulid,
    #[serde(with = "time::serde::rfc3339")]
    pub iat: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub exp: OffsetDateTime,
    /// Binding to the refresh token issued alongside: `BASE64URL(SHA256(refresh))`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtb: Option<String>,
}

/// An authentic access token, expired or not.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub claims: AccessClaims,
    pub expired: bool,
}

impl ParsedToken {
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.claims.sub
    }

    /// Whether `refresh` is the token this access token was issued with.
    ///
    /// Unbound access tokens accept any refresh token.
    #[must_use]
    pub fn is_bound_to(&self, refresh: &RefreshToken) -> bool {
        match &self.claims.rtb {
            Some(expected) => expected
                .as_bytes()
                .ct_eq(refresh_binding(refresh).as_bytes())
                .into(),
            None => true,
        }
    }
}

/// Issues and parses signed access tokens.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: SigningKey,
    issuer: String,
}

impl TokenCodec {
    #[must_use]
    pub fn new(key: SigningKey, issuer: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue an unbound access token for `subject` valid for `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the token cannot be signed.
    pub fn issue(&self, subject: &SubjectId, lifetime: Duration) -> Result<AccessToken, TokenError> {
        self.issue_at(subject, None, lifetime, OffsetDateTime::now_utc())
    }

    /// Issue an access token bound to the refresh token handed out with it.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the token cannot be signed.
    pub fn issue_bound(
        &self,
        subject: &SubjectId,
        refresh: &RefreshToken,
        lifetime: Duration,
    ) -> Result<AccessToken, TokenError> {
        self.issue_at(subject, Some(refresh), lifetime, OffsetDateTime::now_utc())
    }

    /// Issue with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be encoded or signed.
    pub fn issue_at(
        &self,
        subject: &SubjectId,
        binding: Option<&RefreshToken>,
        lifetime: Duration,
        now: OffsetDateTime,
    ) -> Result<AccessToken, TokenError> {
        let claims = AccessClaims {
            sub: subject.clone(),
            iss: self.issuer.clone(),
            jti: Ulid::new(),
            iat: now,
            exp: now + lifetime,
            rtb: binding.map(refresh_binding),
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;

        let sk = self.key.secret()?;
        let token = PublicToken::sign(&sk, &payload, None, None)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(AccessToken(token))
    }

    /// Verify signature and issuer, and report expiry without failing on it.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` if the format, signature, payload or
    /// issuer is wrong.
    pub fn parse(&self, token: &AccessToken) -> Result<ParsedToken, TokenError> {
        self.parse_at(token, OffsetDateTime::now_utc())
    }

    /// [`parse`](Self::parse) with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn parse_at(
        &self,
        token: &AccessToken,
        now: OffsetDateTime,
    ) -> Result<ParsedToken, TokenError> {
        let token_str = token.as_str();
        if !token_str.starts_with(TOKEN_PREFIX) {
            return Err(TokenError::Malformed("invalid token format".into()));
        }

        let pk = self.key.public()?;

        let untrusted_token = UntrustedToken::<Public, V4>::try_from(token_str)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        // footer is None: tokens are issued without one
        let trusted_token = PublicToken::verify(&pk, &untrusted_token, None, None)
            .map_err(|_| TokenError::Malformed("signature verification failed".into()))?;

        let claims: AccessClaims = serde_json::from_str(trusted_token.payload())
            .map_err(|e| TokenError::Malformed(format!("invalid claims: {e}")))?;

        if claims.iss != self.issuer {
            return Err(TokenError::Malformed(format!(
                "iss: expected '{}', got '{}'",
                self.issuer, claims.iss
            )));
        }

        Ok(ParsedToken {
            expired: now >= claims.exp,
            claims,
        })
    }

    /// Strict variant of [`parse`](Self::parse): an expired token is an error.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for authentic expired tokens, otherwise as
    /// [`parse`](Self::parse).
    pub fn verify(&self, token: &AccessToken) -> Result<AccessClaims, TokenError> {
        let parsed = self.parse(token)?;
        if parsed.expired {
            return Err(TokenError::Expired);
        }
        Ok(parsed.claims)
    }
}

/// Generates a fresh refresh token.
///
/// Returns a 43-character URL-safe string (32 random bytes → base64url).
#[must_use]
pub fn generate_refresh_token() -> RefreshToken {
    let random_bytes: [u8; 32] = rand::rng().random();
    RefreshToken::from(URL_SAFE_NO_PAD.encode(random_bytes))
}

/// `BASE64URL(SHA256(refresh))`
fn refresh_binding(refresh: &RefreshToken) -> String {
    let hash = Sha256::digest(refresh.expose().as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(SigningKey::generate().unwrap(), "test-issuer")
    }

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    #[test]
    fn issued_token_parses_to_subject() {
        let codec = codec();
        let subject = SubjectId::from("u1");
        let token = codec.issue(&subject, Duration::seconds(60)).unwrap();

        assert!(token.as_str().starts_with("v4.public."));
        let parsed = codec.parse(&token).unwrap();
        assert_eq!(parsed.subject(), &subject);
        assert!(!parsed.expired);
        assert_eq!(parsed.claims.iss, "test-issuer");
    }

    #[test]
    fn expired_token_still_yields_subject() {
        let codec = codec();
        let subject = SubjectId::from("u1");
        let token = codec
            .issue_at(&subject, None, Duration::seconds(60), at(1_700_000_000))
            .unwrap();

        let parsed = codec.parse_at(&token, at(1_700_000_060)).unwrap();
        assert!(parsed.expired, "exp boundary counts as expired");
        assert_eq!(parsed.subject(), &subject);

        let parsed = codec.parse_at(&token, at(1_700_000_059)).unwrap();
        assert!(!parsed.expired);
    }

    #[test]
    fn verify_distinguishes_expired_from_malformed() {
        let codec = codec();
        let subject = SubjectId::from("u1");
        let expired = codec
            .issue_at(&subject, None, Duration::seconds(60), at(1_000_000_000))
            .unwrap();

        assert!(matches!(codec.verify(&expired), Err(TokenError::Expired)));
        assert!(matches!(
            codec.verify(&AccessToken::from("garbage")),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_wrong_prefix() {
        let err = codec()
            .parse(&AccessToken::from("v4.local.abcdef"))
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn rejects_token_signed_by_other_key() {
        let subject = SubjectId::from("u1");
        let token = codec().issue(&subject, Duration::seconds(60)).unwrap();

        let err = codec().parse(&token).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn rejects_tampered_payload() {
        let codec = codec();
        let token = codec
            .issue(&SubjectId::from("u1"), Duration::seconds(60))
            .unwrap();

        let mut bytes = token.as_str().as_bytes().to_vec();
        let pos = TOKEN_PREFIX.len() + 10;
        bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let err = codec.parse(&AccessToken::from(tampered)).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn rejects_foreign_issuer() {
        let key = SigningKey::generate().unwrap();
        let ours = TokenCodec::new(key.clone(), "ours");
        let theirs = TokenCodec::new(key, "theirs");
        let token = theirs
            .issue(&SubjectId::from("u1"), Duration::seconds(60))
            .unwrap();

        assert!(matches!(ours.parse(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn bound_token_accepts_only_its_refresh_token() {
        let codec = codec();
        let refresh = generate_refresh_token();
        let token = codec
            .issue_bound(&SubjectId::from("u1"), &refresh, Duration::seconds(60))
            .unwrap();

        let parsed = codec.parse(&token).unwrap();
        assert!(parsed.is_bound_to(&refresh));
        assert!(!parsed.is_bound_to(&generate_refresh_token()));
    }

    #[test]
    fn unbound_token_accepts_any_refresh_token() {
        let codec = codec();
        let token = codec
            .issue(&SubjectId::from("u1"), Duration::seconds(60))
            .unwrap();
        assert!(codec.parse(&token).unwrap().is_bound_to(&generate_refresh_token()));
    }

    #[test]
    fn token_ids_are_unique() {
        let codec = codec();
        let subject = SubjectId::from("u1");
        let a = codec.issue(&subject, Duration::seconds(60)).unwrap();
        let b = codec.issue(&subject, Duration::seconds(60)).unwrap();
        assert_ne!(
            codec.parse(&a).unwrap().claims.jti,
            codec.parse(&b).unwrap().claims.jti
        );
    }

    #[test]
    fn refresh_token_shape() {
        let token = generate_refresh_token();
        assert_eq!(token.expose().len(), 43);
        assert!(
            token
                .expose()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_refresh_token());
    }

    #[test]
    fn signing_key_hex_round_trip() {
        let key = SigningKey::generate().unwrap();
        let hex_key = hex::encode(key.bytes);
        let parsed = parse_signing_key_hex(&hex_key).unwrap();
        assert_eq!(parsed.verifying_key_hex(), key.verifying_key_hex());
    }

    #[test]
    fn signing_key_hex_rejects_bad_input() {
        assert!(parse_signing_key_hex("zz").is_err());
        assert!(parse_signing_key_hex(&"ab".repeat(32)).is_err());
    }

    #[test]
    fn signing_key_debug_hides_secret() {
        let key = SigningKey::generate().unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode(&key.bytes[..32])));
    }
}
