use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing credentials, or credentials the lifecycle rejected.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The request itself is unusable (missing guid, undecodable cookie).
    #[error("{0}")]
    BadRequest(String),

    /// Internal fault. Logged, never echoed to the client.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => message(StatusCode::UNAUTHORIZED, "unauthorized user"),
            Self::BadRequest(ref msg) => message(StatusCode::BAD_REQUEST, msg),
            Self::Internal(_) => {
                tracing::error!(error = %self, "Auth internal error");
                message(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

fn message(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "message": msg }))).into_response()
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        if e.is_internal() {
            Self::Internal(e.to_string())
        } else {
            Self::Unauthenticated
        }
    }
}
