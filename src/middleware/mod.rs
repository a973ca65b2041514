//! Cookie transport for the session lifecycle, as an Axum router.
//!
//! Access and refresh tokens travel in encrypted, HttpOnly cookies (`at` and
//! `rt` by default). The refresh cookie holds the base64-wrapped token.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sessionguard::middleware::{AuthConfig, AuthState, auth_routes, require_session};
//!
//! let manager = SessionManager::new(&token_config, store, TracingNotifier);
//! let state = AuthState::new(AuthConfig::from_env()?, manager);
//!
//! // POST /api/login, POST /api/refresh, POST /api/auth/logout, GET /api/auth/guid
//! let app = axum::Router::new()
//!     .route("/api/auth/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         require_session::<_, _>,
//!     ))
//!     .merge(auth_routes(state));
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::AuthConfig;
pub use error::AuthError;
pub use extractor::AuthSubject;
pub use routes::{auth_routes, require_session};
pub use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
