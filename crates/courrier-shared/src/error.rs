use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Malformed encryption envelope")]
    EnvelopeMalformed,

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u16),
}
