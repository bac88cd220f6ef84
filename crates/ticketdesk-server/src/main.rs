mod cleanup;
mod config;

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use ticketdesk_api::AppStateInner;
use ticketdesk_db::Repositories;

use crate::config::Config;

/// How often expired sessions are swept.
const SESSION_PURGE_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketdesk=debug,ticketdesk_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("TICKETDESK_JWT_SECRET is unset or still a placeholder; API tokens can be forged.");
        warn!("Set it in your .env file before exposing this server.");
    }

    let repos = Repositories::open(&config.backend())?;
    info!("Using {:?} store", config.store);

    let state = AppStateInner::new(repos, config.auth());

    if config.seed_demo_user {
        let accounts = state.accounts.clone();
        if let Some(user) = tokio::task::spawn_blocking(move || accounts.seed_demo_user()).await?? {
            info!("Demo account ready: {}", user.email);
        }
    }

    tokio::spawn(cleanup::run_session_purge_loop(
        state.sessions.clone(),
        SESSION_PURGE_INTERVAL_SECS,
    ));

    let app = ticketdesk_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("TicketDesk listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Could not install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
