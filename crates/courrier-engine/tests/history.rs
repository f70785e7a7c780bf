//! Read paths: dialogs, conversations, history pages.

mod support;

use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;

use courrier_engine::{EngineError, MessageBuilder, Mode};
use courrier_net::dto::{
    ConversationDto, ConversationsResponse, DialogDto, DialogsResponse, HistoryResponse,
    MessageDto, OwnerSidecar,
};
use courrier_shared::ids::{PeerId, RemoteId};
use courrier_shared::message::MessageStatus;
use courrier_shared::owner::{Owner, User};
use courrier_shared::patch::PeerPatch;
use courrier_shared::peer::{Keyboard, KeyboardButton};
use courrier_store::{MessagesStore, PeersStore};

use support::Harness;

fn message_dto(peer_id: PeerId, remote_id: RemoteId, from_id: PeerId) -> MessageDto {
    MessageDto {
        id: remote_id,
        conversation_message_id: remote_id,
        peer_id,
        from_id,
        out: false,
        date: Utc::now(),
        updated_at: None,
        text: Some(format!("m{remote_id}")),
        payload: None,
        attachments: Vec::new(),
        forward_messages: Vec::new(),
        important: false,
        deleted: false,
        reactions: Vec::new(),
        my_reaction: None,
    }
}

fn conversation_dto(peer_id: PeerId, last_message_id: RemoteId) -> ConversationDto {
    ConversationDto {
        peer_id,
        title: None,
        avatar_url: None,
        in_read: 0,
        out_read: 0,
        unread_count: 1,
        last_message_id,
        pinned: None,
        keyboard: None,
        major_order: 0,
        minor_order: 0,
    }
}

#[tokio::test]
async fn conversation_modes_cache_net_any() {
    let harness = Harness::new(vec![1]);

    // Cache-only on an empty replica is a quiet not-found.
    let result = harness.engine.get_conversation(1, 5, Mode::Cache).await;
    assert!(matches!(result, Err(EngineError::NotFound)));

    // ANY falls back to the network and writes through.
    *harness.messages_api.conversations.lock().unwrap() = Some(ConversationsResponse {
        items: vec![conversation_dto(5, 0)],
        owners: OwnerSidecar {
            users: vec![User::new(5, "Cinq", "Personne")],
            communities: Vec::new(),
        },
    });
    let conversation = harness.engine.get_conversation(1, 5, Mode::Any).await.unwrap();
    assert_eq!(conversation.peer.id, 5);
    assert_eq!(conversation.peer.unread_count, 1);
    assert!(matches!(conversation.interlocutor, Some(Owner::User(_))));

    // The replica now serves cache mode.
    let cached = harness.engine.get_conversation(1, 5, Mode::Cache).await.unwrap();
    assert_eq!(cached.peer.id, 5);
}

#[tokio::test]
async fn dialogs_page_caches_peers_messages_and_badge() {
    let harness = Harness::new(vec![1]);
    *harness.messages_api.dialogs.lock().unwrap() = Some(DialogsResponse {
        dialogs: vec![DialogDto {
            conversation: conversation_dto(5, 31),
            last_message: Some(message_dto(5, 31, 5)),
        }],
        unread_count: 4,
        owners: OwnerSidecar {
            users: vec![User::new(5, "Cinq", "Personne")],
            communities: Vec::new(),
        },
    });

    let dialogs = harness.engine.get_dialogs(1, 20, None).await.unwrap();
    assert_eq!(dialogs.len(), 1);
    let dialog = &dialogs[0];
    assert_eq!(dialog.peer.id, 5);
    assert_eq!(
        dialog.interlocutor.as_ref().map(|o| o.display_name()),
        Some("Cinq Personne".to_string())
    );

    // The last message landed in the replica and the peer points at it.
    let last = dialog.last_message.as_ref().unwrap();
    assert_ne!(last.id, 0);
    assert_eq!(dialog.peer.last_message_id, Some(last.id));
    let stored = harness.store.find_peer(1, 5).await.unwrap().unwrap();
    assert_eq!(stored.last_message_id, Some(last.id));

    assert_eq!(harness.store.unread_dialogs_count(1).await.unwrap(), 4);

    // The sidecar already carried the interlocutor: no owner fetch needed.
    assert!(harness.owners_api.user_calls.lock().unwrap().is_empty());

    // The cached list serves the same dialog without touching the remote.
    *harness.messages_api.dialogs.lock().unwrap() = None;
    let cached = harness.engine.get_cached_dialogs(1).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].peer.id, 5);
    assert_eq!(
        cached[0].last_message.as_ref().map(|m| m.id),
        dialog.peer.last_message_id
    );
    assert!(cached[0].interlocutor.is_some());
}

#[tokio::test]
async fn first_history_page_keeps_undelivered_messages() {
    let harness = Harness::new(vec![1]);

    // A message of ours is still queued in this conversation.
    let queued = harness
        .engine
        .save_message(MessageBuilder::new(1, 5).text("en route"))
        .await
        .unwrap();

    *harness.messages_api.history.lock().unwrap() = Some(HistoryResponse {
        messages: vec![message_dto(5, 32, 5), message_dto(5, 31, 5)],
        conversation: Some(conversation_dto(5, 32)),
        owners: OwnerSidecar {
            users: vec![User::new(5, "Cinq", "Personne")],
            communities: Vec::new(),
        },
    });

    let page = harness
        .engine
        .get_peer_messages(1, 5, 50, None, None, true, false)
        .await
        .unwrap();

    // Remote rows and the in-flight one are all present.
    assert!(page.messages.iter().any(|m| m.id == queued.id
        && m.status == MessageStatus::Queue));
    assert!(page.messages.iter().any(|m| m.remote_id == 31));
    assert!(page.messages.iter().any(|m| m.remote_id == 32));
    assert!(page.owners.get(5).is_some());

    // Conversation counters were folded into the peer row.
    let state = &harness.store.find_peer_states(1, &[5]).await.unwrap()[0];
    assert_eq!(state.unread_count, 1);
    let last_row = &harness.store.find_by_remote_ids(1, 5, &[32]).await.unwrap()[0];
    assert_eq!(state.last_message_id, Some(last_row.id));
}

#[tokio::test]
async fn pagination_drops_the_anchor_message() {
    let harness = Harness::new(vec![1]);
    *harness.messages_api.history.lock().unwrap() = Some(HistoryResponse {
        messages: vec![message_dto(5, 30, 5), message_dto(5, 29, 5)],
        conversation: None,
        owners: OwnerSidecar::default(),
    });

    let page = harness
        .engine
        .get_peer_messages(1, 5, 50, None, Some(30), false, false)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].remote_id, 29);
}

#[tokio::test]
async fn read_pin_and_dialog_deletion_round_trip() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .apply_peer_patches(1, &[PeerPatch::new(5).with_unread_count(3)])
        .await
        .unwrap();

    harness.engine.mark_as_read(1, 5, 40).await.unwrap();
    let state = &harness.store.find_peer_states(1, &[5]).await.unwrap()[0];
    assert_eq!(state.in_read, 40);
    assert_eq!(state.unread_count, 0);

    // Pin a delivered message, then unpin.
    harness
        .engine
        .insert_messages(1, vec![message_dto(5, 41, 5)])
        .await
        .unwrap();
    let row = harness.store.find_by_remote_ids(1, 5, &[41]).await.unwrap()[0].clone();
    harness
        .engine
        .pin_message(1, 5, Some(row))
        .await
        .unwrap();
    let peer = harness.store.find_peer(1, 5).await.unwrap().unwrap();
    assert_eq!(peer.pinned.as_ref().map(|m| m.remote_id), Some(41));

    harness.engine.pin_message(1, 5, None).await.unwrap();
    let peer = harness.store.find_peer(1, 5).await.unwrap().unwrap();
    assert!(peer.pinned.is_none());

    // Deleting the dialog purges the peer and announces it once.
    let mut deletions = harness.engine.observe_peer_deleting();
    harness.engine.delete_dialog(1, 5).await.unwrap();
    let deleted = timeout(Duration::from_secs(2), deletions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deleted.peer_id, 5);
    assert!(harness.store.find_peer(1, 5).await.unwrap().is_none());
}

#[tokio::test]
async fn keyboard_updates_land_on_the_peer() {
    let harness = Harness::new(vec![1]);
    let keyboard = Keyboard {
        one_time: false,
        inline: true,
        buttons: vec![vec![KeyboardButton {
            label: "Commander".into(),
            payload: Some("{\"action\":\"order\"}".into()),
            kind: "text".into(),
            color: None,
        }]],
    };
    harness
        .engine
        .update_dialog_keyboard(1, 5, Some(keyboard.clone()))
        .await
        .unwrap();
    let peer = harness.store.find_peer(1, 5).await.unwrap().unwrap();
    assert_eq!(peer.keyboard, Some(keyboard));

    harness
        .engine
        .update_dialog_keyboard(1, 5, None)
        .await
        .unwrap();
    let peer = harness.store.find_peer(1, 5).await.unwrap().unwrap();
    assert!(peer.keyboard.is_none());
}

#[tokio::test]
async fn deleting_unsent_messages_needs_no_network() {
    let harness = Harness::new(vec![1]);
    let queued = harness
        .engine
        .save_message(MessageBuilder::new(1, 5).text("brouillon"))
        .await
        .unwrap();

    harness
        .engine
        .delete_messages(1, 5, &[queued.id], false, false)
        .await
        .unwrap();

    let row = &harness.store.find_by_ids(1, &[queued.id]).await.unwrap()[0];
    assert!(row.deleted);
    // No remote send/delete happened for a local-only draft.
    assert!(harness.messages_api.sent().is_empty());
}
