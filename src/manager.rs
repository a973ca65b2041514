//! Session lifecycle: login, token check, refresh with rotation, logout.
//!
//! The manager holds no session state of its own. Each subject has at most
//! one session record in the [`SessionStore`]; every login or refresh
//! replaces it, which invalidates the previous refresh token on the spot.
//!
//! Refresh rules, in order:
//! 1. the access token must be authentic (expiry is ignored);
//! 2. the presented refresh token's digest must match the stored one;
//! 3. the client fingerprint must match, otherwise the session is deleted;
//! 4. the record is rotated with a compare-and-swap on the old digest;
//! 5. a changed network origin is reported to the [`AnomalyNotifier`] once
//!    the rotation is committed, so only the winning refresh reports it.

use time::{Duration, OffsetDateTime};

use crate::config::TokenConfig;
use crate::error::Error;
use crate::notifier::{AnomalyNotifier, OriginChange};
use crate::store::{Precondition, SessionRecord, SessionStore, StoreError};
use crate::token::{ParsedToken, TokenCodec, generate_refresh_token};
use crate::types::{AccessToken, ClientFingerprint, NetworkOrigin, RefreshToken, SubjectId, TokenPair};

/// Orchestrates the token lifecycle over a store and a notifier.
pub struct SessionManager<S, N> {
    codec: TokenCodec,
    access_ttl: Duration,
    store: S,
    notifier: N,
}

impl<S: SessionStore, N: AnomalyNotifier> SessionManager<S, N> {
    #[must_use]
    pub fn new(config: &TokenConfig, store: S, notifier: N) -> Self {
        Self {
            codec: TokenCodec::new(config.signing_key.clone(), config.issuer.clone()),
            access_ttl: config.access_ttl,
            store,
            notifier,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a session for `subject`, superseding any existing one.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] if the store does not know the subject.
    /// - [`Error::Store`] / [`Error::Signing`] on internal faults.
    pub async fn login(
        &self,
        subject: &SubjectId,
        client_fingerprint: ClientFingerprint,
        network_origin: NetworkOrigin,
    ) -> Result<TokenPair, Error> {
        tracing::debug!(subject = %subject, "Starting login");

        let pair = self.issue_pair(subject)?;
        let record = SessionRecord {
            refresh_digest: self.store.digest(&pair.refresh).await.map_err(Error::Store)?,
            client_fingerprint,
            network_origin,
        };

        match self.store.write(subject, record, Precondition::None).await {
            Ok(()) => {}
            Err(StoreError::UnknownSubject) => {
                tracing::warn!(subject = %subject, "Login rejected: unknown subject");
                return Err(Error::Unauthorized);
            }
            Err(e) => return Err(Error::Store(e)),
        }

        tracing::info!(subject = %subject, "Login successful");
        Ok(pair)
    }

    /// Validate an access token against the refresh token it was issued with.
    ///
    /// Never touches the store.
    ///
    /// # Errors
    ///
    /// - [`Error::Expired`] if the access token is authentic but expired; the
    ///   caller may then [`refresh_tokens`](Self::refresh_tokens).
    /// - [`Error::InvalidToken`] if the access token is malformed, forged, or
    ///   bound to a different refresh token.
    pub fn check_tokens(&self, access: &AccessToken, refresh: &RefreshToken) -> Result<(), Error> {
        let parsed = self.codec.parse(access)?;
        if !parsed.is_bound_to(refresh) {
            return Err(Error::InvalidToken("token pair mismatch".into()));
        }
        if parsed.expired {
            return Err(Error::Expired);
        }
        Ok(())
    }

    /// Redeem a refresh token for a new pair, rotating the session.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidToken`] if the access token is malformed.
    /// - [`Error::Unauthorized`] if there is no session, the refresh token is
    ///   not the current one, the client fingerprint changed (the session is
    ///   then terminated), or a concurrent refresh won the rotation.
    /// - [`Error::Store`] / [`Error::Signing`] on internal faults.
    pub async fn refresh_tokens(
        &self,
        access: &AccessToken,
        refresh: &RefreshToken,
        client_fingerprint: ClientFingerprint,
        network_origin: NetworkOrigin,
    ) -> Result<TokenPair, Error> {
        tracing::debug!("Refreshing tokens");

        let parsed = self.codec.parse(access)?;
        let subject = parsed.subject();

        let presented = self.store.digest(refresh).await.map_err(Error::Store)?;
        let stored = match self.store.read(subject).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                tracing::warn!(subject = %subject, "Refresh denied: no session");
                return Err(Error::Unauthorized);
            }
            Err(e) => return Err(Error::Store(e)),
        };
        if stored.refresh_digest != presented {
            tracing::warn!(subject = %subject, "Refresh denied: stale or foreign refresh token");
            return Err(Error::Unauthorized);
        }

        if stored.client_fingerprint != client_fingerprint {
            tracing::warn!(subject = %subject, "Client fingerprint changed, terminating session");
            self.terminate(subject).await;
            return Err(Error::Unauthorized);
        }

        let origin_change = (stored.network_origin != network_origin).then(|| OriginChange {
            subject: subject.clone(),
            previous_origin: stored.network_origin,
            current_origin: network_origin.clone(),
            client_fingerprint: client_fingerprint.clone(),
            detected_at: OffsetDateTime::now_utc(),
        });

        let pair = self.issue_pair(subject)?;
        let record = SessionRecord {
            refresh_digest: self.store.digest(&pair.refresh).await.map_err(Error::Store)?,
            client_fingerprint,
            network_origin,
        };

        match self
            .store
            .write(subject, record, Precondition::CurrentDigest(presented))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound | StoreError::Conflict | StoreError::UnknownSubject) => {
                tracing::warn!(subject = %subject, "Refresh denied: session rotated concurrently");
                return Err(Error::Unauthorized);
            }
            Err(e) => return Err(Error::Store(e)),
        }

        if let Some(event) = origin_change {
            self.notifier.notify(event);
        }

        tracing::debug!(subject = %subject, "Tokens refreshed");
        Ok(pair)
    }

    /// End the session of the access token's subject. Expiry is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidToken`] if the access token is malformed.
    /// - [`Error::Unauthorized`] if there was no session; callers may treat
    ///   this as an idempotent success.
    /// - [`Error::Store`] on internal faults.
    pub async fn logout(&self, access: &AccessToken) -> Result<(), Error> {
        let parsed = self.codec.parse(access)?;
        match self.store.delete(parsed.subject()).await {
            Ok(()) => {
                tracing::info!(subject = %parsed.subject(), "Logged out");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(Error::Unauthorized),
            Err(e) => Err(Error::Store(e)),
        }
    }

    /// Subject of an authentic access token, expired or not.
    ///
    /// Expiry is not checked: a request that was just refreshed still carries
    /// the previous access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] if the access token is malformed.
    pub fn get_guid(&self, access: &AccessToken) -> Result<SubjectId, Error> {
        let ParsedToken { claims, .. } = self.codec.parse(access)?;
        Ok(claims.sub)
    }

    fn issue_pair(&self, subject: &SubjectId) -> Result<TokenPair, Error> {
        let refresh = generate_refresh_token();
        let access = self.codec.issue_bound(subject, &refresh, self.access_ttl)?;
        Ok(TokenPair { access, refresh })
    }

    async fn terminate(&self, subject: &SubjectId) {
        match self.store.delete(subject).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => {
                tracing::error!(subject = %subject, error = %e, "Failed to terminate session");
            }
        }
    }
}
