use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

use super::error::AuthError;
use crate::types::{ClientFingerprint, NetworkOrigin, SubjectId};

/// Subject of the current request, established by
/// [`require_session`](super::require_session).
///
/// Use as an Axum extractor in handlers behind that middleware. Returns
/// `401 Unauthorized` when the middleware did not run.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(AuthSubject(subject): AuthSubject) -> impl IntoResponse {
///     format!("Hello, {subject}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSubject(pub SubjectId);

impl<St: Send + Sync> FromRequestParts<St> for AuthSubject {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSubject>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Client identity of a request: fingerprint and network origin.
///
/// The origin is the first `X-Forwarded-For` hop, else `X-Real-IP`, else the
/// socket peer (when served with `into_make_service_with_connect_info`),
/// else `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ClientContext {
    pub(super) fingerprint: ClientFingerprint,
    pub(super) origin: NetworkOrigin,
}

impl ClientContext {
    pub(super) fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Self {
            fingerprint: client_fingerprint(headers),
            origin: network_origin(headers, peer),
        }
    }
}

impl<St: Send + Sync> FromRequestParts<St> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.headers, &parts.extensions))
    }
}

fn client_fingerprint(headers: &HeaderMap) -> ClientFingerprint {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .into()
}

fn network_origin(headers: &HeaderMap, peer: Option<IpAddr>) -> NetworkOrigin {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(ip: &str) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::new(ip.parse().unwrap(), 40_000)));
        extensions
    }

    #[test]
    fn origin_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "8.8.8.8".parse().unwrap());
        let ctx = ClientContext::from_parts(&headers, &peer("7.7.7.7"));
        assert_eq!(ctx.origin, NetworkOrigin::from("9.9.9.9"));

        headers.remove("x-forwarded-for");
        let ctx = ClientContext::from_parts(&headers, &peer("7.7.7.7"));
        assert_eq!(ctx.origin, NetworkOrigin::from("8.8.8.8"));
    }

    #[test]
    fn origin_falls_back_to_peer_address() {
        let ctx = ClientContext::from_parts(&HeaderMap::new(), &peer("7.7.7.7"));
        assert_eq!(ctx.origin, NetworkOrigin::from("7.7.7.7"));

        let ctx = ClientContext::from_parts(&HeaderMap::new(), &Extensions::new());
        assert_eq!(ctx.origin, NetworkOrigin::from("unknown"));
    }

    #[test]
    fn fingerprint_is_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, "Chrome/1".parse().unwrap());
        let ctx = ClientContext::from_parts(&headers, &Extensions::new());
        assert_eq!(ctx.fingerprint, ClientFingerprint::from("Chrome/1"));

        let ctx = ClientContext::from_parts(&HeaderMap::new(), &Extensions::new());
        assert_eq!(ctx.fingerprint, ClientFingerprint::from(""));
    }
}
