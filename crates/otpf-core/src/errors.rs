use std::path::PathBuf;

/// Core error type for the forwarder.
///
/// Adapter crates (Telegram HTTP, SMS command gateway) map their specific
/// errors into this type so the dispatcher can log failures uniformly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file {path}: {reason}")]
    Settings { path: PathBuf, reason: String },

    #[error("pdu error: {0}")]
    Pdu(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
