mod app;
mod auth;
mod clients;
mod config;
mod db_migrations;
mod dispatch;
mod error;
mod routes;
mod services;
mod state;
mod store;
#[cfg(test)]
mod testing;

extern crate self as sqlx;
pub use sqlx_core::pool::PoolConnection;
pub use sqlx_core::query::query;
pub use sqlx_core::query_as::query_as;
pub use sqlx_core::query_scalar::query_scalar;
pub use sqlx_postgres::{PgPool, Postgres};

pub mod postgres {
    pub use sqlx_postgres::PgPoolOptions;
}

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::clients::{DiscordClient, UnlinkedControl, UnlinkedQuery};
use crate::config::{SHUTDOWN_TIMEOUT_SECS, Settings};
use crate::services::panel_reconciler;
use crate::services::scheduler::Scheduler;
use crate::state::{AppState, Collaborators};
use crate::store::PgStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return;
        }
    };
    let interaction_key = match routes::interactions::interaction_key(&settings.discord) {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return;
        }
    };
    if interaction_key.is_none() {
        tracing::warn!("DISCORD_PUBLIC_KEY is not set; /interactions is disabled");
    }

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("DATABASE_URL is required to run porta-server");
            return;
        }
    };
    let db_max_connections = config::db_max_connections();
    tracing::info!(db_max_connections, "Connecting to PostgreSQL...");
    let db = match PgPoolOptions::new()
        .max_connections(db_max_connections)
        .connect(&database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to PostgreSQL");
            return;
        }
    };
    if let Err(e) = db_migrations::run(&db).await {
        tracing::error!(error = %e, "failed to run migrations");
        return;
    }
    tracing::info!("Database connected and migrations applied");

    let discord = match DiscordClient::new(&settings.discord) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "failed to build Discord client");
            return;
        }
    };
    match discord
        .register_commands(&routes::interactions::slash_commands())
        .await
    {
        Ok(0) => tracing::warn!("DISCORD_APPLICATION_ID is not set; slash commands not registered"),
        Ok(count) => tracing::info!(count, "slash commands registered"),
        Err(e) => tracing::warn!(error = %e, "failed to register slash commands"),
    }

    tracing::warn!(
        "no game server query or remote console backend is linked; servers will show offline"
    );
    let store = Arc::new(PgStore::new(db));
    let collaborators = Collaborators {
        query: Arc::new(UnlinkedQuery),
        control: Arc::new(UnlinkedControl),
        messages: discord,
        panels: store.clone(),
        ledger: store,
    };

    let mut scheduler = Scheduler::new();
    let http_addr = settings.http_addr.clone();
    let refresh_interval = settings.refresh_interval;
    let state = AppState::new(settings, collaborators, interaction_key, scheduler.readiness());

    scheduler.spawn_ready_probe(state.clone());
    let reconciler_state = state.clone();
    scheduler.spawn_periodic("panel_reconciler", refresh_interval, move |cancel| {
        panel_reconciler::tick(reconciler_state.clone(), cancel)
    });

    let app = app::build_app(state);

    tracing::info!("porta server listening on {http_addr}");
    let listener = match tokio::net::TcpListener::bind(&http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %http_addr, "failed to bind TCP listener");
            scheduler
                .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
                .await;
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    scheduler
        .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;
    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
