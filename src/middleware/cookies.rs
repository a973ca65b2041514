use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use time::Duration;

use super::config::AuthSettings;
use super::error::AuthError;
use crate::types::{AccessToken, RefreshToken, TokenPair};

fn token_cookie(name: &str, value: String, settings: &AuthSettings) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(settings.cookie_ttl)
        .build()
}

fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Attach both tokens. The refresh token travels base64-wrapped.
pub(super) fn set_token_cookies(
    jar: PrivateCookieJar,
    pair: &TokenPair,
    settings: &AuthSettings,
) -> PrivateCookieJar {
    let access = token_cookie(
        &settings.access_cookie_name,
        pair.access.as_str().to_string(),
        settings,
    );
    let refresh = token_cookie(
        &settings.refresh_cookie_name,
        STANDARD.encode(pair.refresh.expose()),
        settings,
    );
    jar.add(access).add(refresh)
}

/// Remove both token cookies.
pub(super) fn clear_token_cookies(
    jar: PrivateCookieJar,
    settings: &AuthSettings,
) -> PrivateCookieJar {
    jar.remove(removal_cookie(&settings.access_cookie_name))
        .remove(removal_cookie(&settings.refresh_cookie_name))
}

/// Get the access token from cookies.
pub(super) fn get_access_token(
    jar: &PrivateCookieJar,
    settings: &AuthSettings,
) -> Option<AccessToken> {
    jar.get(&settings.access_cookie_name)
        .map(|c| AccessToken::from(c.value().to_string()))
}

/// Get and unwrap the refresh token from cookies.
///
/// `Unauthenticated` if the cookie is absent, `BadRequest` if it does not
/// decode.
pub(super) fn get_refresh_token(
    jar: &PrivateCookieJar,
    settings: &AuthSettings,
) -> Result<RefreshToken, AuthError> {
    let cookie = jar
        .get(&settings.refresh_cookie_name)
        .ok_or(AuthError::Unauthenticated)?;

    let unescaped = urlencoding::decode(cookie.value())
        .map_err(|_| AuthError::BadRequest("invalid refresh token format".into()))?;
    let raw = STANDARD
        .decode(unescaped.as_bytes())
        .map_err(|_| AuthError::BadRequest("invalid refresh token format".into()))?;
    let token = String::from_utf8(raw)
        .map_err(|_| AuthError::BadRequest("invalid refresh token format".into()))?;

    Ok(RefreshToken::from(token))
}
