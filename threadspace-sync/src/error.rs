use std::io;

use thiserror::Error;

use threadspace_core::ConfigError;

/// Construction-time failures. Runtime sync conditions (unknown ids, failed
/// deliveries, persistence errors) are logged and absorbed instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn spawn(name: impl Into<String>, source: io::Error) -> Self {
        SyncError::Spawn {
            name: name.into(),
            source,
        }
    }
}

/// A delivery sink could not accept an update.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("instance context is gone")]
    Disconnected,
    #[error("update rejected: {0}")]
    Rejected(String),
}
