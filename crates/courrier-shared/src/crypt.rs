//! End-to-end session crypto for encrypted conversations.
//!
//! An encrypted message travels as ordinary text carrying an envelope:
//!
//! ```text
//! #e2e@<policy>_<session_id>_<base64(bincode(EnvelopeBody))>
//! ```
//!
//! The body holds a format version and `nonce || ciphertext` produced by
//! XChaCha20-Poly1305.  Key material is a per-(peer, session) pair with
//! distinct outbound and inbound keys: a message we sent decrypts with the
//! pair's own key, a message we received with the counterpart key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{
    ENVELOPE_PREFIX, ENVELOPE_VERSION, KDF_CONTEXT_SESSION_IN, KDF_CONTEXT_SESSION_OUT, NONCE_SIZE,
    SYMMETRIC_KEY_SIZE,
};
use crate::error::CryptoError;
use crate::ids::{AccountId, MessageId, PeerId, SessionId};

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// Where a session's key material is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyLocationPolicy {
    /// Keys survive restarts in the persistent key store.
    Persist,
    /// Keys live only for the process lifetime.
    Ram,
}

impl KeyLocationPolicy {
    pub fn as_digit(self) -> u8 {
        match self {
            KeyLocationPolicy::Persist => 1,
            KeyLocationPolicy::Ram => 2,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(KeyLocationPolicy::Persist),
            2 => Some(KeyLocationPolicy::Ram),
            _ => None,
        }
    }
}

/// Symmetric key material for one encrypted conversation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionKeyPair {
    pub version: u16,
    pub account_id: AccountId,
    pub peer_id: PeerId,
    pub session_id: SessionId,
    pub date: i64,
    pub start_message_id: MessageId,
    pub end_message_id: MessageId,
    /// Key for messages we send in this session.
    pub out_key: SymmetricKey,
    /// Key for messages the peer sends in this session.
    pub in_key: SymmetricKey,
}

/// Parsed encryption envelope, before key resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub policy: KeyLocationPolicy,
    pub session_id: SessionId,
    /// `nonce || ciphertext`
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct EnvelopeBody {
    version: u16,
    data: Vec<u8>,
}

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Encrypt a message body into envelope text for the given session.
pub fn encrypt_message_text(
    key: &SymmetricKey,
    policy: KeyLocationPolicy,
    session_id: SessionId,
    plaintext: &str,
) -> Result<String, CryptoError> {
    let data = encrypt(key, plaintext.as_bytes())?;
    let body = EnvelopeBody {
        version: ENVELOPE_VERSION,
        data,
    };
    let encoded = bincode::serialize(&body).map_err(|_| CryptoError::EncryptionFailed)?;
    Ok(format!(
        "{}{}_{}_{}",
        ENVELOPE_PREFIX,
        policy.as_digit(),
        session_id,
        BASE64.encode(encoded)
    ))
}

/// Try to parse an encryption envelope out of message text.
///
/// Returns `Ok(None)` for plain text; malformed envelopes (the prefix is
/// present but the rest does not parse) are an error so the caller can mark
/// the message as failed.
pub fn parse_envelope_text(text: &str) -> Result<Option<EncryptedEnvelope>, CryptoError> {
    let rest = match text.strip_prefix(ENVELOPE_PREFIX) {
        Some(rest) => rest,
        None => return Ok(None),
    };

    let mut parts = rest.splitn(3, '_');
    let policy = parts
        .next()
        .and_then(|p| p.parse::<u8>().ok())
        .and_then(KeyLocationPolicy::from_digit)
        .ok_or(CryptoError::EnvelopeMalformed)?;
    let session_id = parts
        .next()
        .and_then(|s| s.parse::<SessionId>().ok())
        .ok_or(CryptoError::EnvelopeMalformed)?;
    let encoded = parts.next().ok_or(CryptoError::EnvelopeMalformed)?;

    let raw = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::EnvelopeMalformed)?;
    let body: EnvelopeBody =
        bincode::deserialize(&raw).map_err(|_| CryptoError::EnvelopeMalformed)?;
    if body.version != ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion(body.version));
    }

    Ok(Some(EncryptedEnvelope {
        policy,
        session_id,
        data: body.data,
    }))
}

/// Decrypt an envelope body back into message text.
pub fn decrypt_envelope(
    key: &SymmetricKey,
    envelope: &EncryptedEnvelope,
) -> Result<String, CryptoError> {
    let plaintext = decrypt(key, &envelope.data)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

// BLAKE3 KDF with direction-separated contexts: the initiator's out key is
// the responder's in key and vice versa.
pub fn derive_session_key_pair(
    shared_secret: &[u8],
    session_id: SessionId,
    initiator: bool,
) -> (SymmetricKey, SymmetricKey) {
    let a = derive_session_key(shared_secret, session_id, KDF_CONTEXT_SESSION_OUT);
    let b = derive_session_key(shared_secret, session_id, KDF_CONTEXT_SESSION_IN);
    if initiator {
        (a, b)
    } else {
        (b, a)
    }
}

fn derive_session_key(shared_secret: &[u8], session_id: SessionId, context: &str) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(shared_secret);
    hasher.update(&session_id.to_le_bytes());
    let hash = hasher.finalize();
    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    key.copy_from_slice(&hash.as_bytes()[..SYMMETRIC_KEY_SIZE]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let key = generate_symmetric_key();
        let text =
            encrypt_message_text(&key, KeyLocationPolicy::Persist, 42, "message secret").unwrap();
        assert!(text.starts_with(ENVELOPE_PREFIX));

        let envelope = parse_envelope_text(&text).unwrap().expect("an envelope");
        assert_eq!(envelope.policy, KeyLocationPolicy::Persist);
        assert_eq!(envelope.session_id, 42);
        assert_eq!(decrypt_envelope(&key, &envelope).unwrap(), "message secret");
    }

    #[test]
    fn test_plain_text_is_not_an_envelope() {
        assert!(parse_envelope_text("bonjour").unwrap().is_none());
    }

    #[test]
    fn test_malformed_envelope_fails() {
        assert!(parse_envelope_text("#e2e@not_an_envelope!!").is_err());
        assert!(parse_envelope_text("#e2e@9_12_AAAA").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = generate_symmetric_key();
        let key2 = generate_symmetric_key();
        let text = encrypt_message_text(&key1, KeyLocationPolicy::Ram, 7, "secret").unwrap();
        let envelope = parse_envelope_text(&text).unwrap().unwrap();
        assert!(decrypt_envelope(&key2, &envelope).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_symmetric_key();
        let mut data = encrypt(&key, b"important").unwrap();
        let len = data.len();
        data[len - 1] ^= 0xFF;
        assert!(decrypt(&key, &data).is_err());
    }

    #[test]
    fn test_session_keys_are_mirrored() {
        let secret = b"shared-secret-between-peers";
        let (my_out, my_in) = derive_session_key_pair(secret, 3, true);
        let (his_out, his_in) = derive_session_key_pair(secret, 3, false);
        assert_eq!(my_out, his_in);
        assert_eq!(my_in, his_out);
        assert_ne!(my_out, my_in);
    }

    #[test]
    fn test_different_sessions_different_keys() {
        let secret = b"shared-secret";
        let (out1, _) = derive_session_key_pair(secret, 1, true);
        let (out2, _) = derive_session_key_pair(secret, 2, true);
        assert_ne!(out1, out2);
    }
}
