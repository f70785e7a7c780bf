//! Batch decryption of end-to-end encrypted messages.
//!
//! Key material is resolved once per distinct `(policy, session)`, never
//! once per message, and every failure is confined to the affected message
//! through its crypt status.  No error escapes the batch call.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use courrier_shared::crypt::{
    decrypt_envelope, parse_envelope_text, EncryptedEnvelope, KeyLocationPolicy, SessionKeyPair,
};
use courrier_shared::ids::{AccountId, SessionId};
use courrier_shared::message::{CryptStatus, Message};
use courrier_store::KeysStore;

pub struct MessagesDecryptor {
    keys: Arc<dyn KeysStore>,
}

impl MessagesDecryptor {
    pub fn new(keys: Arc<dyn KeysStore>) -> Self {
        Self { keys }
    }

    /// Classify and decrypt every message flagged `Encrypted`.
    ///
    /// Unparsable envelopes become `DecryptFailed` immediately; the rest are
    /// grouped by session, decrypted with the outbound or inbound key
    /// depending on who sent the message, and classified individually.
    pub async fn decrypt_messages(
        &self,
        account_id: AccountId,
        mut messages: Vec<Message>,
    ) -> Vec<Message> {
        if !messages
            .iter()
            .any(|m| m.crypt_status == CryptStatus::Encrypted)
        {
            // Fast path: nothing to do.
            return messages;
        }

        // Parse envelopes; parse failure drops the message out of the batch.
        let mut envelopes: Vec<(usize, EncryptedEnvelope)> = Vec::new();
        for (index, message) in messages.iter_mut().enumerate() {
            if message.crypt_status != CryptStatus::Encrypted {
                continue;
            }
            let parsed = message
                .text
                .as_deref()
                .map(parse_envelope_text)
                .unwrap_or(Ok(None));
            match parsed {
                Ok(Some(envelope)) => envelopes.push((index, envelope)),
                Ok(None) | Err(_) => {
                    message.crypt_status = CryptStatus::DecryptFailed;
                }
            }
        }

        // One key-store lookup per distinct session.
        let mut sessions: HashMap<(KeyLocationPolicy, SessionId), Option<SessionKeyPair>> =
            HashMap::new();
        for (_, envelope) in &envelopes {
            let session = (envelope.policy, envelope.session_id);
            if sessions.contains_key(&session) {
                continue;
            }
            let pair = match self
                .keys
                .find_key_pair(envelope.policy, account_id, envelope.session_id)
                .await
            {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(session_id = envelope.session_id, error = %e, "key lookup failed");
                    None
                }
            };
            if pair.is_none() {
                debug!(
                    session_id = envelope.session_id,
                    "no key pair for session, messages will be marked failed"
                );
            }
            sessions.insert(session, pair);
        }

        for (index, envelope) in envelopes {
            let message = &mut messages[index];
            let pair = sessions
                .get(&(envelope.policy, envelope.session_id))
                .and_then(|p| p.as_ref());
            let Some(pair) = pair else {
                message.crypt_status = CryptStatus::DecryptFailed;
                continue;
            };
            let key = if message.out {
                &pair.out_key
            } else {
                &pair.in_key
            };
            match decrypt_envelope(key, &envelope) {
                Ok(plaintext) => {
                    message.decrypted_text = Some(plaintext);
                    message.crypt_status = CryptStatus::Decrypted;
                }
                Err(_) => {
                    message.crypt_status = CryptStatus::DecryptFailed;
                }
            }
        }

        messages
    }
}
