use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{MessageType, Phase};

/// Errors returned directly to the caller of a bus operation.
///
/// Handler failures and missing listeners never show up here; they go to
/// the error observers instead.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("'{0}' is not a declared message type")]
    InvalidSubscriptionType(MessageType),

    #[error("phase {0} has no deferred queue")]
    UnknownPhase(Phase),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
