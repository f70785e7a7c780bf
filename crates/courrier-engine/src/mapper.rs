//! DTO-to-replica mapping.

use courrier_net::dto::{ConversationDto, MessageDto};
use courrier_shared::constants::ENVELOPE_PREFIX;
use courrier_shared::ids::{is_group, is_user, PeerId};
use courrier_shared::message::{CryptStatus, Message, MessageStatus};
use courrier_shared::peer::Peer;

/// Map a remote message into a replica entity.  The local id is assigned by
/// the store on insert; delivery status of anything the server returns is
/// `Sent` by definition.
pub fn map_message(dto: MessageDto) -> Message {
    let crypt_status = match &dto.text {
        Some(text) if text.starts_with(ENVELOPE_PREFIX) => CryptStatus::Encrypted,
        _ => CryptStatus::NotEncrypted,
    };
    let forward_messages: Vec<Message> =
        dto.forward_messages.into_iter().map(map_message).collect();

    let mut message = Message::new(dto.peer_id, dto.from_id);
    message.remote_id = dto.id;
    message.conversation_message_id = dto.conversation_message_id;
    message.out = dto.out;
    message.date = dto.date;
    message.updated_at = dto.updated_at;
    message.text = dto.text;
    message.payload = dto.payload;
    message.attachments = dto.attachments;
    message.forward_count = forward_messages.len() as u32;
    message.forward_messages = forward_messages;
    message.status = MessageStatus::Sent;
    message.crypt_status = crypt_status;
    message.important = dto.important;
    message.deleted = dto.deleted;
    message.reactions = dto.reactions;
    message.my_reaction = dto.my_reaction;
    message
}

/// Map a conversation into a peer aggregate.  The last-message pointer is
/// resolved separately because it lives in the local id space.
pub fn map_conversation(dto: ConversationDto) -> Peer {
    let mut peer = Peer::new(dto.peer_id);
    peer.title = dto.title;
    peer.avatar_url = dto.avatar_url;
    peer.in_read = dto.in_read;
    peer.out_read = dto.out_read;
    peer.unread_count = dto.unread_count;
    peer.pinned = dto.pinned.map(|p| Box::new(map_message(*p)));
    peer.keyboard = dto.keyboard;
    peer.major_order = dto.major_order;
    peer.minor_order = dto.minor_order;
    peer
}

/// Owner ids referenced by a batch of messages: senders, user/group peers,
/// and the forwarded subtrees, deduplicated in first-seen order.
pub fn collect_owner_ids(messages: &[Message]) -> Vec<PeerId> {
    let mut ids = Vec::new();
    fn append(ids: &mut Vec<PeerId>, messages: &[Message]) {
        for message in messages {
            if !ids.contains(&message.from_id) {
                ids.push(message.from_id);
            }
            if (is_user(message.peer_id) || is_group(message.peer_id))
                && !ids.contains(&message.peer_id)
            {
                ids.push(message.peer_id);
            }
            append(ids, &message.forward_messages);
        }
    }
    append(&mut ids, messages);
    ids
}
