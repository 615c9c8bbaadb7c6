use thiserror::Error;

/// Errors raised while talking to Syncthing or loading configuration.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Syncthing API error: {0}")]
    Syncthing(String),

    #[error("Failed to decode Syncthing payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event handoff closed")]
    HandoffClosed,

    #[error("No API key configured and none found in the Syncthing config.xml")]
    MissingApiKey,
}
