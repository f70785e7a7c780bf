//! Push-notification payloads, as decoded by the (external) long-poll layer.
//!
//! The engine translates every one of these into the same patch types that
//! local mutations use, so the replica has exactly one reconciliation path.

use serde::{Deserialize, Serialize};

use courrier_shared::ids::{CmId, PeerId, ReactionId, RemoteId};
use courrier_shared::message::ReactionEntry;

/// Message flag bits, as used by the flags set/reset updates.
pub const FLAG_IMPORTANT: u32 = 8;
pub const FLAG_DELETED: u32 = 128;
pub const FLAG_DELETED_FOR_ALL: u32 = 131_072;

pub fn has_flag(mask: u32, flag: u32) -> bool {
    mask & flag == flag
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagsSetUpdate {
    pub message_id: RemoteId,
    pub peer_id: PeerId,
    pub mask: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagsResetUpdate {
    pub message_id: RemoteId,
    pub peer_id: PeerId,
    pub mask: u32,
}

/// The peer read our messages up to `message_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputReadUpdate {
    pub peer_id: PeerId,
    pub message_id: RemoteId,
}

/// We read the conversation up to `message_id` (from another device).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputReadUpdate {
    pub peer_id: PeerId,
    pub message_id: RemoteId,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionChangeUpdate {
    pub peer_id: PeerId,
    pub conversation_message_id: CmId,
    pub message_id: RemoteId,
    pub my_reaction_changed: bool,
    pub my_reaction: Option<ReactionId>,
    pub reactions: Vec<ReactionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteTextUpdate {
    pub peer_id: PeerId,
    pub from_ids: Vec<PeerId>,
    pub is_text: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BadgeCountUpdate {
    pub count: u32,
}
