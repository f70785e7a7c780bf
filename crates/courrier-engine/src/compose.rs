//! Outbound message composition.
//!
//! `save_message` turns a builder into a stored replica row in the right
//! starting status: `Queue` when nothing blocks delivery, `WaitingForUpload`
//! while attachments are still uploading.  An upload already in the error
//! state refuses composition entirely; the caller must fix the attachment
//! and resend, which is a different situation from "retry later".

use courrier_net::uploads::{UploadDestination, UploadStatus};
use courrier_shared::attachment::Attachment;
use courrier_shared::crypt::{encrypt_message_text, KeyLocationPolicy};
use courrier_shared::ids::{AccountId, MessageId, PeerId};
use courrier_shared::message::{CryptStatus, Message, MessageStatus};

use crate::engine::EngineInner;
use crate::error::{EngineError, Result};

/// Everything needed to create (or re-save) an outbound message.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    pub account_id: AccountId,
    pub peer_id: PeerId,
    /// Existing draft row to overwrite, if any.
    pub draft_id: Option<MessageId>,
    pub text: Option<String>,
    pub payload: Option<String>,
    pub attachments: Vec<Attachment>,
    pub forward_messages: Vec<Message>,
    pub voice_file: Option<String>,
    pub require_encryption: bool,
    pub key_policy: KeyLocationPolicy,
}

impl MessageBuilder {
    pub fn new(account_id: AccountId, peer_id: PeerId) -> Self {
        Self {
            account_id,
            peer_id,
            draft_id: None,
            text: None,
            payload: None,
            attachments: Vec::new(),
            forward_messages: Vec::new(),
            voice_file: None,
            require_encryption: false,
            key_policy: KeyLocationPolicy::Persist,
        }
    }

    pub fn draft(mut self, draft_id: MessageId) -> Self {
        self.draft_id = Some(draft_id);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn forward(mut self, messages: Vec<Message>) -> Self {
        self.forward_messages = messages;
        self
    }

    pub fn voice_file(mut self, path: impl Into<String>) -> Self {
        self.voice_file = Some(path.into());
        self
    }

    pub fn encrypted(mut self, policy: KeyLocationPolicy) -> Self {
        self.require_encryption = true;
        self.key_policy = policy;
        self
    }
}

impl EngineInner {
    pub(crate) async fn save_message(&self, builder: MessageBuilder) -> Result<Message> {
        let account_id = builder.account_id;
        let status = self.target_message_status(&builder).await?;
        let body = self.final_message_body(&builder).await?;

        let mut message = Message::new(builder.peer_id, account_id);
        message.out = true;
        message.status = status;
        message.text = body;
        message.payload = builder.payload.clone();
        message.attachments = builder.attachments.clone();
        message.forward_count = builder.forward_messages.len() as u32;
        message.forward_messages = builder.forward_messages.clone();
        message.voice_file = builder.voice_file.clone();
        message.crypt_status = if builder.require_encryption {
            CryptStatus::Encrypted
        } else {
            CryptStatus::NotEncrypted
        };

        let id = self
            .stores
            .messages
            .upsert_draft(account_id, builder.draft_id, message)
            .await?;
        let mut rows = self.stores.messages.find_by_ids(account_id, &[id]).await?;
        let mut stored = rows.pop().ok_or(EngineError::NotFound)?;
        if builder.require_encryption {
            // The plaintext the author just typed is the decrypted form.
            stored.decrypted_text = builder.text;
            stored.crypt_status = CryptStatus::Decrypted;
        }
        Ok(stored)
    }

    /// `Queue` unless uploads for this draft are outstanding; a failed
    /// upload refuses composition outright.
    async fn target_message_status(&self, builder: &MessageBuilder) -> Result<MessageStatus> {
        let Some(draft_id) = builder.draft_id else {
            return Ok(MessageStatus::Queue);
        };
        let destination = UploadDestination::for_message(draft_id);
        let uploads = self
            .uploads
            .get_pending(builder.account_id, &destination)
            .await;
        if uploads.is_empty() {
            return Ok(MessageStatus::Queue);
        }
        let mut uploading_now = false;
        for upload in &uploads {
            match upload.status {
                UploadStatus::Cancelling => continue,
                UploadStatus::Error => return Err(EngineError::UploadNotResolved),
                UploadStatus::Queued | UploadStatus::Uploading => uploading_now = true,
            }
        }
        Ok(if uploading_now {
            MessageStatus::WaitingForUpload
        } else {
            MessageStatus::Queue
        })
    }

    /// The body as it will be stored: encrypted into an envelope when the
    /// builder asks for end-to-end encryption.
    async fn final_message_body(&self, builder: &MessageBuilder) -> Result<Option<String>> {
        let Some(text) = builder.text.as_deref() else {
            return Ok(None);
        };
        if !builder.require_encryption {
            return Ok(Some(text.to_string()));
        }
        let pair = self
            .stores
            .keys
            .find_last_key_pair(builder.key_policy, builder.account_id, builder.peer_id)
            .await?
            .ok_or(EngineError::KeyPairMissing)?;
        let encrypted =
            encrypt_message_text(&pair.out_key, builder.key_policy, pair.session_id, text)?;
        Ok(Some(encrypted))
    }
}
