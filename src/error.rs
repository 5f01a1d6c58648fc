//! Muninn error types

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    // Upstream/network errors
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned error status {status}")]
    UpstreamStatus { status: u16 },

    // Request errors
    #[error("missing required query parameter '{0}'")]
    MissingParam(&'static str),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Listener errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for muninn operations
pub type Result<T> = std::result::Result<T, ProxyError>;
