use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{AuthConfig, AuthSettings};
use crate::manager::SessionManager;
use crate::notifier::AnomalyNotifier;
use crate::store::SessionStore;

/// Shared state for the auth routes and [`require_session`](super::require_session).
pub struct AuthState<S, N> {
    pub(super) manager: Arc<SessionManager<S, N>>,
    pub(super) settings: AuthSettings,
}

impl<S: SessionStore, N: AnomalyNotifier> AuthState<S, N> {
    #[must_use]
    pub fn new(config: AuthConfig, manager: SessionManager<S, N>) -> Self {
        Self::with_shared_manager(config, Arc::new(manager))
    }

    /// Share a manager that other parts of the application also hold.
    #[must_use]
    pub fn with_shared_manager(config: AuthConfig, manager: Arc<SessionManager<S, N>>) -> Self {
        Self {
            manager,
            settings: config.settings,
        }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager<S, N>> {
        &self.manager
    }
}

// Manual Clone: avoid derive adding `S: Clone, N: Clone` bounds.
impl<S, N> Clone for AuthState<S, N> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore, N: AnomalyNotifier> FromRef<AuthState<S, N>> for Key {
    fn from_ref(state: &AuthState<S, N>) -> Self {
        state.settings.cookie_key.clone()
    }
}
