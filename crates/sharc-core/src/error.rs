use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharcError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the watchlist store. Local state is never modified
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("identity provider error: {0}")]
    Identity(String),

    #[error("remote table error: {0}")]
    Remote(String),

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}
