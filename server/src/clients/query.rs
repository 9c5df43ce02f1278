use std::time::Duration;

use async_trait::async_trait;
use porta_shared::{Endpoint, ServerInfo};

use crate::error::QueryError;

/// Game-server status query (A2S-style info + player list).
#[async_trait]
pub trait ServerQuery: Send + Sync {
    async fn query(&self, address: &Endpoint, timeout: Duration)
    -> Result<ServerInfo, QueryError>;
}

/// Placeholder used when no query backend is linked into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlinkedQuery;

#[async_trait]
impl ServerQuery for UnlinkedQuery {
    async fn query(
        &self,
        address: &Endpoint,
        _timeout: Duration,
    ) -> Result<ServerInfo, QueryError> {
        Err(QueryError::Unreachable(format!(
            "no query backend linked for {address}"
        )))
    }
}
