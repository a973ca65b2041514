use axum::extract::{Query, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use super::config::AuthSettings;
use super::cookies;
use super::error::AuthError;
use super::extractor::{AuthSubject, ClientContext};
use super::state::AuthState;
use crate::error::Error;
use crate::notifier::AnomalyNotifier;
use crate::store::SessionStore;
use crate::types::{SubjectId, TokenPair};

/// Create the token lifecycle router.
///
/// - `POST {api}/login?guid=…` issues a pair (201)
/// - `POST {api}/refresh` rotates the pair (201)
/// - `POST {auth}/logout` ends the session (204)
/// - `GET {auth}/guid` returns `{"guid": …}`
///
/// Routes under `{auth}` run behind [`require_session`].
pub fn auth_routes<S, N>(state: AuthState<S, N>) -> Router
where
    S: SessionStore,
    N: AnomalyNotifier,
{
    let api_path = state.settings.api_path.clone();
    let auth_path = state.settings.auth_path.clone();

    let protected = Router::new()
        .route(&format!("{auth_path}/logout"), post(logout::<S, N>))
        .route(&format!("{auth_path}/guid"), get(guid))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_session::<S, N>,
        ));

    Router::new()
        .route(&format!("{api_path}/login"), post(login::<S, N>))
        .route(&format!("{api_path}/refresh"), post(refresh::<S, N>))
        .merge(protected)
        .with_state(state)
}

// ── Session check ──────────────────────────────────────────────────

/// Middleware admitting requests with a valid token pair.
///
/// An expired access token is refreshed on the fly and the new cookies are
/// attached to the response, unless the handler itself set the token
/// cookies (as logout does when clearing them). Handlers read the subject
/// through [`AuthSubject`].
pub async fn require_session<S: SessionStore, N: AnomalyNotifier>(
    State(state): State<AuthState<S, N>>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let client = ClientContext::from_parts(request.headers(), request.extensions());
    let (subject, refreshed) = match authorize(&state, &jar, client).await {
        Ok(outcome) => outcome,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthSubject(subject));
    let response = next.run(request).await;

    match refreshed {
        Some(pair) if !sets_token_cookies(&response, &state.settings) => {
            (cookies::set_token_cookies(jar, &pair, &state.settings), response).into_response()
        }
        _ => response,
    }
}

fn sets_token_cookies(response: &Response, settings: &AuthSettings) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split_once('='))
        .any(|(name, _)| {
            let name = name.trim();
            name == settings.access_cookie_name || name == settings.refresh_cookie_name
        })
}

async fn authorize<S: SessionStore, N: AnomalyNotifier>(
    state: &AuthState<S, N>,
    jar: &PrivateCookieJar,
    client: ClientContext,
) -> Result<(SubjectId, Option<TokenPair>), AuthError> {
    let refresh = cookies::get_refresh_token(jar, &state.settings)?;
    let access =
        cookies::get_access_token(jar, &state.settings).ok_or(AuthError::Unauthenticated)?;

    match state.manager.check_tokens(&access, &refresh) {
        Ok(()) => Ok((state.manager.get_guid(&access)?, None)),
        Err(Error::Expired) => {
            tracing::info!("Access token expired, refreshing");
            let pair = state
                .manager
                .refresh_tokens(&access, &refresh, client.fingerprint, client.origin)
                .await
                .map_err(rejected)?;
            let subject = state.manager.get_guid(&pair.access)?;
            Ok((subject, Some(pair)))
        }
        Err(e) => Err(rejected(e)),
    }
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    guid: Option<String>,
}

async fn login<S: SessionStore, N: AnomalyNotifier>(
    State(state): State<AuthState<S, N>>,
    jar: PrivateCookieJar,
    client: ClientContext,
    Query(params): Query<LoginParams>,
) -> Result<(StatusCode, PrivateCookieJar), AuthError> {
    let subject = params
        .guid
        .filter(|g| !g.is_empty())
        .map(SubjectId::from)
        .ok_or_else(|| AuthError::BadRequest("guid required".into()))?;

    let pair = state
        .manager
        .login(&subject, client.fingerprint, client.origin)
        .await
        .map_err(rejected)?;

    tracing::info!(subject = %subject, "Tokens have been sent");
    Ok((
        StatusCode::CREATED,
        cookies::set_token_cookies(jar, &pair, &state.settings),
    ))
}

// ── Refresh ────────────────────────────────────────────────────────

async fn refresh<S: SessionStore, N: AnomalyNotifier>(
    State(state): State<AuthState<S, N>>,
    jar: PrivateCookieJar,
    client: ClientContext,
) -> Result<(StatusCode, PrivateCookieJar), AuthError> {
    let refresh = cookies::get_refresh_token(&jar, &state.settings)?;
    let access =
        cookies::get_access_token(&jar, &state.settings).ok_or(AuthError::Unauthenticated)?;

    match state.manager.check_tokens(&access, &refresh) {
        Ok(()) | Err(Error::Expired) => {}
        Err(e) => return Err(rejected(e)),
    }

    let pair = state
        .manager
        .refresh_tokens(&access, &refresh, client.fingerprint, client.origin)
        .await
        .map_err(rejected)?;

    Ok((
        StatusCode::CREATED,
        cookies::set_token_cookies(jar, &pair, &state.settings),
    ))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore, N: AnomalyNotifier>(
    State(state): State<AuthState<S, N>>,
    jar: PrivateCookieJar,
) -> Result<(StatusCode, PrivateCookieJar), AuthError> {
    let access =
        cookies::get_access_token(&jar, &state.settings).ok_or(AuthError::Unauthenticated)?;

    match state.manager.logout(&access).await {
        // already logged out: nothing left to revoke
        Ok(()) | Err(Error::Unauthorized) => {}
        Err(e) => return Err(rejected(e)),
    }

    Ok((
        StatusCode::NO_CONTENT,
        cookies::clear_token_cookies(jar, &state.settings),
    ))
}

// ── GUID ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GuidResponse {
    guid: SubjectId,
}

async fn guid(AuthSubject(subject): AuthSubject) -> Json<GuidResponse> {
    Json(GuidResponse { guid: subject })
}

// ── Helpers ────────────────────────────────────────────────────────

fn rejected(e: Error) -> AuthError {
    if !e.is_internal() {
        tracing::warn!(error = %e, "Credentials rejected");
    }
    AuthError::from(e)
}
