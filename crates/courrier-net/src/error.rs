use thiserror::Error;

/// Errors produced by the remote service layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// The addressed entity (peer, message, account session) does not exist
    /// on the server.
    #[error("Remote entity not found")]
    NotFound,

    /// Transport-level failure (connectivity, timeout, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an application-level error.
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
