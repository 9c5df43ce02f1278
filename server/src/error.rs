use std::time::Duration;

use thiserror::Error;

/// How a failure should be treated by the reconciler and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts and refused connections. Retried by the next cycle or by the human.
    TransientUpstream,
    /// The message or channel no longer exists. Terminal for a panel binding.
    ResourceGone,
    PermissionDenied,
    Invalid,
    Internal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("server unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("{0} no longer exists")]
    Gone(String),
    #[error("chat platform request failed: {0}")]
    Transient(String),
    #[error("chat platform rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl MessageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Gone(_) => ErrorClass::ResourceGone,
            Self::Transient(_) => ErrorClass::TransientUpstream,
            Self::Rejected { .. } => ErrorClass::Internal,
        }
    }

    pub fn is_gone(&self) -> bool {
        self.class() == ErrorClass::ResourceGone
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx_core::error::Error),
    #[error("uniqueness conflict on {0}")]
    Conflict(&'static str),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No permission.")]
    PermissionDenied,
    #[error("Unknown server `{0}`.")]
    UnknownServer(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Remote command failed: {0}")]
    Control(#[from] ControlError),
    #[error("Chat platform error: {0}")]
    Message(#[from] MessageError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PermissionDenied => ErrorClass::PermissionDenied,
            Self::UnknownServer(_) | Self::InvalidInput(_) => ErrorClass::Invalid,
            Self::Control(_) => ErrorClass::TransientUpstream,
            Self::Message(error) => error.class(),
            Self::Store(_) => ErrorClass::Internal,
        }
    }
}
