use std::time::Duration;

use async_trait::async_trait;
use porta_shared::Endpoint;

use crate::error::ControlError;

/// Remote console (RCON-style) command execution.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    async fn execute(
        &self,
        address: &Endpoint,
        credential: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ControlError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnlinkedControl;

#[async_trait]
impl RemoteControl for UnlinkedControl {
    async fn execute(
        &self,
        address: &Endpoint,
        _credential: &str,
        _command: &str,
        _timeout: Duration,
    ) -> Result<String, ControlError> {
        Err(ControlError::Connection(format!(
            "no control backend linked for {address}"
        )))
    }
}
