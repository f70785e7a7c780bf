//! The message entity and its delivery / crypto state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::ids::{CmId, MessageId, PeerId, ReactionId, RemoteId};

/// Delivery status of a locally-known message.
///
/// Locally-created messages move `Queue -> Sending -> {Sent | Error}`; a
/// message whose attachments are still uploading parks in
/// `WaitingForUpload` until the upload completes.  `Error` returns to
/// `Queue` only through an explicit re-enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Sending,
    Queue,
    Error,
    WaitingForUpload,
}

/// Encryption/decryption outcome, independent of delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptStatus {
    NotEncrypted,
    Encrypted,
    Decrypted,
    DecryptFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionEntry {
    pub reaction_id: ReactionId,
    pub count: u32,
}

/// A single message in the local replica.
///
/// `id` is the stable local id; `remote_id` stays `0` until the server
/// acknowledges delivery.  `decrypted_text` is derived at read time and is
/// never serialized: when the source text was encrypted, plaintext must not
/// leave the process through the IPC models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub remote_id: RemoteId,
    pub conversation_message_id: CmId,
    pub peer_id: PeerId,
    pub from_id: PeerId,
    pub out: bool,
    pub date: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    #[serde(skip_serializing, default)]
    pub decrypted_text: Option<String>,
    pub payload: Option<String>,
    pub attachments: Vec<Attachment>,
    pub forward_messages: Vec<Message>,
    pub forward_count: u32,
    pub status: MessageStatus,
    pub crypt_status: CryptStatus,
    pub important: bool,
    pub deleted: bool,
    pub deleted_for_all: bool,
    pub reactions: Vec<ReactionEntry>,
    pub my_reaction: Option<ReactionId>,
    /// Path of a not-yet-uploaded voice recording attached to this message.
    pub voice_file: Option<String>,
}

impl Message {
    pub fn new(peer_id: PeerId, from_id: PeerId) -> Self {
        Self {
            id: 0,
            remote_id: 0,
            conversation_message_id: 0,
            peer_id,
            from_id,
            out: false,
            date: Utc::now(),
            updated_at: None,
            text: None,
            decrypted_text: None,
            payload: None,
            attachments: Vec::new(),
            forward_messages: Vec::new(),
            forward_count: 0,
            status: MessageStatus::Queue,
            crypt_status: CryptStatus::NotEncrypted,
            important: false,
            deleted: false,
            deleted_for_all: false,
            reactions: Vec::new(),
            my_reaction: None,
            voice_file: None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.crypt_status != CryptStatus::NotEncrypted
    }

    /// Text safe to show: decrypted body when available, `None` when
    /// decryption failed, the raw body otherwise.
    pub fn display_text(&self) -> Option<&str> {
        match self.crypt_status {
            CryptStatus::NotEncrypted => self.text.as_deref(),
            CryptStatus::Decrypted => self.decrypted_text.as_deref(),
            CryptStatus::Encrypted | CryptStatus::DecryptFailed => None,
        }
    }
}
