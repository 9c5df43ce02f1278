use futures::future::join_all;
use porta_shared::{ServerDescriptor, ServerStatus, StatusSnapshot};
use tracing::debug;

use crate::error::QueryError;
use crate::state::AppState;

/// Queries every registered server concurrently. One failure never affects its siblings.
pub async fn build(state: &AppState) -> StatusSnapshot {
    let probes = state
        .settings
        .registry
        .iter()
        .map(|server| probe(state, server));
    StatusSnapshot {
        servers: join_all(probes).await,
    }
}

/// Single-server snapshot, or None for an unknown key.
pub async fn build_one(state: &AppState, key: &str) -> Option<ServerStatus> {
    let server = state.settings.registry.get(key)?;
    Some(probe(state, server).await)
}

async fn probe(state: &AppState, server: &ServerDescriptor) -> ServerStatus {
    let timeout = state.settings.query_timeout;
    let outcome = tokio::time::timeout(timeout, state.query.query(&server.query, timeout))
        .await
        .unwrap_or(Err(QueryError::Timeout(timeout)));

    state.observability.record_status_query(outcome.is_err());
    match outcome {
        Ok(info) => ServerStatus::online(server, info),
        Err(e) => {
            debug!(server = %server.key, address = %server.query, error = %e, "server offline");
            ServerStatus::offline(server, e.to_string())
        }
    }
}
