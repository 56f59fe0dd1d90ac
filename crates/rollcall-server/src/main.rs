//! Rollcall Identity HTTP server.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rollcall::store::{MemoryStore, SqliteStore};
use rollcall::{IdentityService, IdentityStore};
use rollcall_server::{bootstrap_admin, router, AppState, CookieSettings, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("reading configuration")?;

    match &config.db_path {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            tracing::info!(path = %path.display(), "using sqlite store");
            run(store, config).await
        }
        None => {
            tracing::warn!("ROLLCALL_DB not set; sessions and credentials live in memory");
            run(MemoryStore::new(), config).await
        }
    }
}

async fn run<S: IdentityStore>(store: S, config: ServerConfig) -> anyhow::Result<()> {
    let service = Arc::new(
        IdentityService::new(store, config.identity_config())
            .context("building identity service")?,
    );

    if let Some((username, password)) = &config.bootstrap_admin {
        if bootstrap_admin(&*service, username, password)
            .await
            .context("provisioning bootstrap admin")?
        {
            tracing::info!(username = %username, "bootstrap admin provisioned");
        }
    }

    let purged = service
        .purge_expired_sessions()
        .await
        .context("purging expired sessions")?;
    if purged > 0 {
        tracing::info!(purged, "removed expired sessions");
    }

    let state = AppState::new(
        service.clone(),
        CookieSettings {
            secure: config.secure_cookie,
            max_age: config.session_ttl,
        },
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(addr = %config.addr, "rollcall identity server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    service.flush_audit().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
