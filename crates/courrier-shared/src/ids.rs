//! Numeric identifiers and the peer-kind range encoding.
//!
//! A peer id is a single signed integer whose value range encodes what kind
//! of conversation endpoint it names:
//!
//! - `0 < id < CONTACT_BASE`: an individual user
//! - `id < 0`: a community (the community id negated)
//! - `CONTACT_BASE..CHAT_BASE`: a contact-only pseudo-peer
//! - `id >= CHAT_BASE`: a multi-user chat (`id - CHAT_BASE` is the chat id)
//!
//! An owner id of `0` stands for "the current account" and is resolved by the
//! owner-resolution layer before it ever reaches the store.

use serde::{Deserialize, Serialize};

pub type AccountId = i64;
pub type PeerId = i64;
/// Local replica message id, stable within the local store.
pub type MessageId = i32;
/// Server-assigned message id; `0` until the message has been delivered.
pub type RemoteId = i32;
/// Per-conversation message sequence id assigned by the server.
pub type CmId = i32;
pub type SessionId = i64;
pub type ReactionId = i32;

/// First id of the contact-only pseudo-peer range.
pub const CONTACT_BASE: i64 = 1_900_000_000;

/// First id of the multi-user chat range.
pub const CHAT_BASE: i64 = 2_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerKind {
    User,
    Group,
    Chat,
    Contact,
}

pub fn peer_kind(id: PeerId) -> PeerKind {
    if id >= CHAT_BASE {
        PeerKind::Chat
    } else if id >= CONTACT_BASE {
        PeerKind::Contact
    } else if id < 0 {
        PeerKind::Group
    } else {
        PeerKind::User
    }
}

pub fn is_user(id: PeerId) -> bool {
    peer_kind(id) == PeerKind::User
}

pub fn is_group(id: PeerId) -> bool {
    peer_kind(id) == PeerKind::Group
}

/// Peer id of a multi-user chat.
pub fn peer_from_chat_id(chat_id: i64) -> PeerId {
    CHAT_BASE + chat_id
}

/// Chat id of a multi-user chat peer, if the id is in the chat range.
pub fn chat_id_from_peer(peer_id: PeerId) -> Option<i64> {
    if peer_id >= CHAT_BASE {
        Some(peer_id - CHAT_BASE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ranges() {
        assert_eq!(peer_kind(1), PeerKind::User);
        assert_eq!(peer_kind(CONTACT_BASE - 1), PeerKind::User);
        assert_eq!(peer_kind(-42), PeerKind::Group);
        assert_eq!(peer_kind(CONTACT_BASE), PeerKind::Contact);
        assert_eq!(peer_kind(CHAT_BASE), PeerKind::Chat);
        assert_eq!(peer_kind(CHAT_BASE + 7), PeerKind::Chat);
    }

    #[test]
    fn chat_id_round_trip() {
        let peer = peer_from_chat_id(17);
        assert_eq!(peer_kind(peer), PeerKind::Chat);
        assert_eq!(chat_id_from_peer(peer), Some(17));
        assert_eq!(chat_id_from_peer(123), None);
    }
}
