//! Error handling - one hierarchy for the whole crate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// stock-ticker error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors, rejected at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup of a symbol not present in the store
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Delivery failure reported by the broadcast collaborator
    #[error("Broadcast error: {0}")]
    Broadcast(String),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors (transport listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
