//! Session persistence contract and an in-memory implementation.
//!
//! One record per subject. A record exists exactly while the subject is
//! logged in; rotation replaces it as a whole.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use parking_lot::Mutex;

use crate::digest::{DigestKey, RefreshDigest};
use crate::types::{ClientFingerprint, NetworkOrigin, RefreshToken, SubjectId};

/// Failures reported by a [`SessionStore`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The subject is not provisioned in the upstream identity system.
    #[error("subject is not known")]
    UnknownSubject,

    #[error("no session for subject")]
    NotFound,

    /// A conditional write found a different digest than expected.
    #[error("session was rotated concurrently")]
    Conflict,

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Persisted state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub refresh_digest: RefreshDigest,
    pub client_fingerprint: ClientFingerprint,
    pub network_origin: NetworkOrigin,
}

/// Condition a [`SessionStore::write`] must check atomically with the write.
#[derive(Debug, Clone, Copy)]
pub enum Precondition {
    /// Write or replace unconditionally (login).
    None,
    /// Replace only if a record exists and still holds this digest (refresh).
    CurrentDigest(RefreshDigest),
}

/// Consumer-provided session persistence.
///
/// `write` with [`Precondition::CurrentDigest`] must compare and replace as a
/// single atomic step: of two rotations presenting the same old digest, at
/// most one may succeed. With a SQL backend this is an
/// `UPDATE … WHERE subject = $1 AND refresh_digest = $2`.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for PgSessions {
///     async fn digest(&self, token: &RefreshToken) -> Result<RefreshDigest, StoreError> {
///         Ok(self.key.digest(token))
///     }
///
///     async fn read(&self, subject: &SubjectId) -> Result<SessionRecord, StoreError> {
///         self.db.find(subject).await.map_err(backend)?.ok_or(StoreError::NotFound)
///     }
///     // write, delete ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Compute the comparison digest of a presented refresh token.
    fn digest(
        &self,
        token: &RefreshToken,
    ) -> impl Future<Output = Result<RefreshDigest, StoreError>> + Send;

    /// Load the session of `subject`. `StoreError::NotFound` if there is none.
    fn read(
        &self,
        subject: &SubjectId,
    ) -> impl Future<Output = Result<SessionRecord, StoreError>> + Send;

    /// Write the session of `subject`, subject to `precondition`.
    ///
    /// `StoreError::UnknownSubject` if the subject is not provisioned,
    /// `NotFound`/`Conflict` if a `CurrentDigest` precondition fails.
    fn write(
        &self,
        subject: &SubjectId,
        record: SessionRecord,
        precondition: Precondition,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete the session of `subject`. `StoreError::NotFound` if there is none.
    fn delete(&self, subject: &SubjectId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process [`SessionStore`] backed by a mutex-guarded map.
///
/// Optionally restricted to a provisioned set of subjects; writes for any
/// other subject fail with `StoreError::UnknownSubject`.
#[derive(Debug)]
pub struct MemorySessionStore {
    key: DigestKey,
    known_subjects: Option<HashSet<SubjectId>>,
    sessions: Mutex<HashMap<SubjectId, SessionRecord>>,
}

impl MemorySessionStore {
    /// Store accepting any subject.
    #[must_use]
    pub fn new(key: DigestKey) -> Self {
        Self {
            key,
            known_subjects: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Restrict writes to the given subjects.
    #[must_use]
    pub fn with_known_subjects<I>(mut self, subjects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SubjectId>,
    {
        self.known_subjects = Some(subjects.into_iter().map(Into::into).collect());
        self
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn is_known(&self, subject: &SubjectId) -> bool {
        self.known_subjects
            .as_ref()
            .is_none_or(|known| known.contains(subject))
    }
}

impl SessionStore for MemorySessionStore {
    async fn digest(&self, token: &RefreshToken) -> Result<RefreshDigest, StoreError> {
        Ok(self.key.digest(token))
    }

    async fn read(&self, subject: &SubjectId) -> Result<SessionRecord, StoreError> {
        self.sessions
            .lock()
            .get(subject)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn write(
        &self,
        subject: &SubjectId,
        record: SessionRecord,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        if !self.is_known(subject) {
            return Err(StoreError::UnknownSubject);
        }

        let mut sessions = self.sessions.lock();
        if let Precondition::CurrentDigest(expected) = precondition {
            let current = sessions.get(subject).ok_or(StoreError::NotFound)?;
            if current.refresh_digest != expected {
                return Err(StoreError::Conflict);
            }
        }
        sessions.insert(subject.clone(), record);
        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .remove(subject)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
