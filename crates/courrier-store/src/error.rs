use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Unique-key violation (e.g. a session key pair saved twice).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend-specific failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
