#![doc = include_str!("../README.md")]

pub mod config;
pub mod digest;
pub mod error;
pub mod manager;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod notifier;
pub mod store;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use config::TokenConfig;
pub use digest::{DigestKey, RefreshDigest};
pub use error::Error;
pub use manager::SessionManager;
#[cfg(feature = "webhook")]
pub use notifier::WebhookNotifier;
pub use notifier::{AnomalyNotifier, OriginChange, TracingNotifier};
pub use store::{MemorySessionStore, Precondition, SessionRecord, SessionStore, StoreError};
pub use token::{
    AccessClaims, ParsedToken, SigningKey, TokenCodec, TokenError, generate_refresh_token,
    parse_signing_key_hex,
};
pub use types::{AccessToken, ClientFingerprint, NetworkOrigin, RefreshToken, SubjectId, TokenPair};
