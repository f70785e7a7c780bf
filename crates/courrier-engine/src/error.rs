use thiserror::Error;

use courrier_net::NetError;
use courrier_shared::CryptoError;
use courrier_store::StoreError;

/// Errors produced by the engine.
///
/// `NotFound` is expected absence and terminates the current operation
/// quietly; it is never surfaced as a user error.  `UploadNotResolved` and
/// `KeyPairMissing` are distinct so callers can tell "retry later" from
/// "fix the message and resend".
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Net(#[from] NetError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("No session key pair for this conversation")]
    KeyPairMissing,

    #[error("An attachment upload failed or is unresolved")]
    UploadNotResolved,

    #[error("Forwarded messages are not delivered yet")]
    UnresolvedForward,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
