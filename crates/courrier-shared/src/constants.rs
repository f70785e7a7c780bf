/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Text prefix marking an end-to-end encrypted message body
pub const ENVELOPE_PREFIX: &str = "#e2e@";

/// Envelope body format version
pub const ENVELOPE_VERSION: u16 = 1;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_SESSION_OUT: &str = "courrier-session-out-v1";
pub const KDF_CONTEXT_SESSION_IN: &str = "courrier-session-in-v1";
