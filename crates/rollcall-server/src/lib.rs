//! # Rollcall Server
//!
//! The HTTP surface of Rollcall Identity.
//!
//! | Route                        | Success                                   | Failure          |
//! |------------------------------|-------------------------------------------|------------------|
//! | `POST /login`                | user, sets the session cookie             | 401              |
//! | `POST /logout`               | clears the session cookie                 |                  |
//! | `GET /user`                  | current user                              | 401              |
//! | `POST /impersonation/start`  | `{impersonatedUser, originalUser}`        | 401, 403, 404, 409 |
//! | `POST /impersonation/stop`   | `{originalUser}`                          | 401, 409         |
//! | `POST /user/switch-role`     | updated user                              | 401, 403, 409    |
//! | `GET /healthz`               | `ok`                                      |                  |
//!
//! The session is named by an HTTP-only cookie holding an opaque token; all
//! identity state stays on the server.

pub mod config;
pub mod error;
pub mod payload;
pub mod routes;
pub mod session;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;

use rollcall::core::{Principal, Role};
use rollcall::store::CredentialStore;
use rollcall::{IdentityError, IdentityService, IdentityStore};

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError};
pub use session::{CookieSettings, COOKIE_NAME};

/// Shared handler state.
pub struct AppState<S: IdentityStore> {
    pub service: Arc<IdentityService<S>>,
    pub cookies: CookieSettings,
}

impl<S: IdentityStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            cookies: self.cookies,
        }
    }
}

impl<S: IdentityStore> AppState<S> {
    pub fn new(service: Arc<IdentityService<S>>, cookies: CookieSettings) -> Self {
        Self { service, cookies }
    }
}

/// Build the router.
pub fn router<S: IdentityStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/login", post(routes::login::<S>))
        .route("/logout", post(routes::logout::<S>))
        .route("/user", get(routes::current_user::<S>))
        .route("/user/switch-role", post(routes::switch_role::<S>))
        .route("/impersonation/start", post(routes::start_impersonation::<S>))
        .route("/impersonation/stop", post(routes::stop_impersonation::<S>))
        .route("/healthz", get(routes::healthz))
        .layer(ServiceBuilder::new().layer(middleware::from_fn(trace_and_harden)))
        .with_state(state)
}

/// Log each request and forbid caching of identity responses.
async fn trace_and_harden(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    tracing::debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Provision a super_admin named `username` unless the username is taken.
///
/// Returns whether a principal was created.
pub async fn bootstrap_admin<S: IdentityStore>(
    service: &IdentityService<S>,
    username: &str,
    password: &str,
) -> Result<bool, IdentityError> {
    let normalized = username.trim().to_ascii_lowercase();
    if service.store().find_credential(&normalized).await?.is_some() {
        tracing::info!(username = %normalized, "bootstrap admin already present");
        return Ok(false);
    }

    let id = service.allocate_principal_id().await?;
    let admin = Principal::new(id, username.trim(), Role::from("super_admin"));
    match service.provision(username, password, admin).await {
        Ok(_) => Ok(true),
        Err(IdentityError::UsernameTaken(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
