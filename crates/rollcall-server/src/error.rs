//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall::IdentityError;
use serde_json::json;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Malformed request body.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Errors loading [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl ServerError {
    /// Status and client-facing message. Authentication and authorization
    /// failures carry fixed messages; state conflicts carry their reason.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::Identity(e) => match e {
                IdentityError::Authentication => {
                    (StatusCode::UNAUTHORIZED, "invalid username or password".into())
                }
                IdentityError::Unauthenticated => {
                    (StatusCode::UNAUTHORIZED, "not authenticated".into())
                }
                IdentityError::Authorization(_) => (StatusCode::FORBIDDEN, "forbidden".into()),
                IdentityError::NotFound(_) => (StatusCode::NOT_FOUND, "user not found".into()),
                IdentityError::State(state) => (StatusCode::CONFLICT, state.to_string()),
                IdentityError::UsernameTaken(_) => {
                    (StatusCode::CONFLICT, "username already taken".into())
                }
                IdentityError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                IdentityError::Permissions(_)
                | IdentityError::Credential(_)
                | IdentityError::Store(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
                }
            },
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
