//! Message attachments as a tagged union.
//!
//! The send path turns these into wire tokens (`courrier-net`); stickers are
//! special-cased there because the remote send operation takes a sticker id
//! instead of an attachment token.

use serde::{Deserialize, Serialize};

use crate::ids::PeerId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    Photo(Photo),
    Doc(Doc),
    Sticker(Sticker),
    Voice(VoiceMessage),
}

impl Attachment {
    pub fn is_sticker(&self) -> bool {
        matches!(self, Attachment::Sticker(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Photo {
    pub id: i64,
    pub owner_id: PeerId,
    pub access_key: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doc {
    pub id: i64,
    pub owner_id: PeerId,
    pub access_key: Option<String>,
    pub title: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sticker {
    pub id: i64,
}

/// An already-uploaded audio message.  A voice recording that has not been
/// uploaded yet travels on the message itself (`Message::voice_file`) until
/// the send queue exchanges it for a token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceMessage {
    pub id: i64,
    pub owner_id: PeerId,
    pub access_key: Option<String>,
    pub duration_secs: u32,
}
