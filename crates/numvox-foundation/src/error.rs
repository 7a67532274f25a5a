use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors from the persistent key-value settings store.
///
/// These are never allowed to escape past the settings layer: callers log
/// them and continue with in-memory state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
