//! Error handling for the realtime client

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Send attempted while the hub channel is not connected.
    /// Callers own the retry policy; nothing is queued.
    #[error("Not connected to hub")]
    NotConnected,

    /// Transport-level failure (dial, read, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Handshake rejected by the hub (bad or expired credential)
    #[error("Auth error: {0}")]
    Auth(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}
