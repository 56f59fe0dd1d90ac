//! Route handlers.
//!
//! Every handler takes the session from the cookie and nothing else: no
//! identity data in a request body is trusted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{self, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall::{IdentityError, IdentityStore, Role, SessionToken};
use serde_json::json;

use crate::error::ServerError;
use crate::payload::{
    ImpersonationStarted, ImpersonationStopped, LoginRequest, StartImpersonationRequest,
    SwitchRoleRequest, UserBody,
};
use crate::session::session_token;
use crate::AppState;

type HandlerResult = Result<Response, ServerError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(t)| t)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn require_session(headers: &HeaderMap) -> Result<SessionToken, ServerError> {
    session_token(headers).ok_or(ServerError::Identity(IdentityError::Unauthenticated))
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn login<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> HandlerResult {
    let req = body(payload)?;
    let previous = session_token(&headers);

    let outcome = app
        .service
        .login(&req.username, &req.password, previous.as_ref())
        .await?;

    Ok((
        [(header::SET_COOKIE, app.cookies.issue(&outcome.token))],
        Json(UserBody::normal(outcome.identity)),
    )
        .into_response())
}

pub async fn logout<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
) -> HandlerResult {
    if let Some(token) = session_token(&headers) {
        app.service.logout(&token).await?;
    }

    Ok((
        [(header::SET_COOKIE, app.cookies.clear())],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

pub async fn current_user<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = require_session(&headers)?;
    let identity = app.service.current_identity(&token).await?;
    Ok(Json(UserBody::from(identity)).into_response())
}

pub async fn start_impersonation<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
    payload: Result<Json<StartImpersonationRequest>, JsonRejection>,
) -> HandlerResult {
    let token = require_session(&headers)?;
    let req = body(payload)?;

    let imp = app
        .service
        .start_impersonation(&token, req.target_user_id)
        .await?;
    let original_id = imp.original.principal.id;

    Ok(Json(ImpersonationStarted {
        impersonated_user: UserBody::impersonated(imp.impersonated, original_id),
        original_user: UserBody::normal(imp.original),
    })
    .into_response())
}

pub async fn stop_impersonation<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = require_session(&headers)?;
    let restored = app.service.stop_impersonation(&token).await?;

    Ok(Json(ImpersonationStopped {
        original_user: UserBody::normal(restored),
    })
    .into_response())
}

pub async fn switch_role<S: IdentityStore>(
    State(app): State<AppState<S>>,
    headers: HeaderMap,
    payload: Result<Json<SwitchRoleRequest>, JsonRejection>,
) -> HandlerResult {
    let token = require_session(&headers)?;
    let req = body(payload)?;

    let updated = app
        .service
        .switch_role(&token, &Role::new(req.role))
        .await?;
    Ok(Json(UserBody::normal(updated)).into_response())
}
