//! Wire payloads exchanged with the remote messaging service.
//!
//! DTOs are deliberately close to the domain model; the engine's mapper
//! turns them into replica entities and decides the crypto classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courrier_shared::attachment::Attachment;
use courrier_shared::ids::{CmId, MessageId, PeerId, ReactionId, RemoteId};
use courrier_shared::message::ReactionEntry;
use courrier_shared::owner::{Community, User};
use courrier_shared::peer::Keyboard;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDto {
    pub id: RemoteId,
    pub conversation_message_id: CmId,
    pub peer_id: PeerId,
    pub from_id: PeerId,
    pub out: bool,
    pub date: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub payload: Option<String>,
    pub attachments: Vec<Attachment>,
    pub forward_messages: Vec<MessageDto>,
    pub important: bool,
    pub deleted: bool,
    pub reactions: Vec<ReactionEntry>,
    pub my_reaction: Option<ReactionId>,
}

// ---------------------------------------------------------------------------
// Conversations / dialogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationDto {
    pub peer_id: PeerId,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub in_read: RemoteId,
    pub out_read: RemoteId,
    pub unread_count: u32,
    pub last_message_id: RemoteId,
    pub pinned: Option<Box<MessageDto>>,
    pub keyboard: Option<Keyboard>,
    pub major_order: i32,
    pub minor_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogDto {
    pub conversation: ConversationDto,
    pub last_message: Option<MessageDto>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Owner records the service sends alongside most responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerSidecar {
    pub users: Vec<User>,
    pub communities: Vec<Community>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryResponse {
    pub messages: Vec<MessageDto>,
    /// Present when the first page is requested: the conversation's current
    /// read markers and counters.
    pub conversation: Option<ConversationDto>,
    pub owners: OwnerSidecar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogsResponse {
    pub dialogs: Vec<DialogDto>,
    pub unread_count: u32,
    pub owners: OwnerSidecar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationsResponse {
    pub items: Vec<ConversationDto>,
    pub owners: OwnerSidecar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageResponse {
    pub message_id: RemoteId,
    pub conversation_message_id: CmId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteAck {
    pub message_id: RemoteId,
    pub ok: bool,
}

// ---------------------------------------------------------------------------
// Send request
// ---------------------------------------------------------------------------

/// One outbound delivery, fully resolved: every attachment is a token, every
/// forwarded message a remote id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendRequest {
    pub local_id: MessageId,
    pub peer_id: PeerId,
    pub text: Option<String>,
    pub payload: Option<String>,
    pub attachments: Vec<AttachmentToken>,
    pub sticker_id: Option<i64>,
    pub reply_to: Option<RemoteId>,
    pub forward_ids: Vec<RemoteId>,
}

impl SendRequest {
    pub fn new(local_id: MessageId, peer_id: PeerId) -> Self {
        Self {
            local_id,
            peer_id,
            text: None,
            payload: None,
            attachments: Vec::new(),
            sticker_id: None,
            reply_to: None,
            forward_ids: Vec::new(),
        }
    }
}

/// Wire reference to an already-uploaded attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentToken {
    Photo {
        id: i64,
        owner_id: PeerId,
        access_key: Option<String>,
    },
    Doc {
        id: i64,
        owner_id: PeerId,
        access_key: Option<String>,
    },
    AudioMessage {
        id: i64,
        owner_id: PeerId,
        access_key: Option<String>,
    },
}

/// Token for an attachment that is already hosted remotely.  Stickers have
/// no token: the send operation takes the sticker id directly.
pub fn token_for(attachment: &Attachment) -> Option<AttachmentToken> {
    match attachment {
        Attachment::Photo(p) => Some(AttachmentToken::Photo {
            id: p.id,
            owner_id: p.owner_id,
            access_key: p.access_key.clone(),
        }),
        Attachment::Doc(d) => Some(AttachmentToken::Doc {
            id: d.id,
            owner_id: d.owner_id,
            access_key: d.access_key.clone(),
        }),
        Attachment::Voice(v) => Some(AttachmentToken::AudioMessage {
            id: v.id,
            owner_id: v.owner_id,
            access_key: v.access_key.clone(),
        }),
        Attachment::Sticker(_) => None,
    }
}
