use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Engine-side failure; displays the engine's own message
    #[error("{0}")]
    Database(#[from] duckdb::Error),

    #[error("Unknown table '{name}': {reason}")]
    UnknownTable { name: String, reason: String },

    #[error("Unsupported table format '{0}' (expected parquet, csv, json or auto)")]
    UnsupportedFormat(String),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed backend response: {0}")]
    Protocol(String),

    #[error("Connector configuration error: {0}")]
    Config(String),

    #[error("Internal connector error: {0}")]
    Internal(String),
}
