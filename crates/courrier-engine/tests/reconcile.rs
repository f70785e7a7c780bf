//! Reconciliation: patch application, aggregate recomputation, push handlers.

mod support;

use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::timeout;

use courrier_net::dto::MessageDto;
use courrier_net::push::{
    BadgeCountUpdate, FlagsResetUpdate, FlagsSetUpdate, InputReadUpdate, OutputReadUpdate,
    WriteTextUpdate, FLAG_DELETED, FLAG_IMPORTANT,
};
use courrier_shared::ids::{PeerId, RemoteId};
use courrier_shared::patch::{MessagePatch, PeerPatch};
use courrier_store::{MessagesStore, PeersStore};

use support::Harness;

async fn recv<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

fn inbound(peer_id: PeerId, remote_id: RemoteId) -> MessageDto {
    MessageDto {
        id: remote_id,
        conversation_message_id: remote_id,
        peer_id,
        from_id: peer_id,
        out: false,
        date: Utc::now(),
        updated_at: None,
        text: Some(format!("message {remote_id}")),
        payload: None,
        attachments: Vec::new(),
        forward_messages: Vec::new(),
        important: false,
        deleted: false,
        reactions: Vec::new(),
        my_reaction: None,
    }
}

fn outbound(peer_id: PeerId, remote_id: RemoteId) -> MessageDto {
    MessageDto {
        out: true,
        from_id: 1,
        ..inbound(peer_id, remote_id)
    }
}

/// Unread counts equal a full replay of inbound, non-deleted messages after
/// any sequence of inserts and read-marker patches.
#[tokio::test]
async fn unread_count_is_recomputed_not_incremented() {
    let harness = Harness::new(vec![1]);
    // Seed the conversation row.
    harness
        .engine
        .apply_peer_patches(1, &[PeerPatch::new(10).with_unread_count(0)])
        .await
        .unwrap();

    harness
        .engine
        .insert_messages(
            1,
            vec![inbound(10, 1), outbound(10, 2), inbound(10, 3), inbound(10, 4)],
        )
        .await
        .unwrap();

    let state = &harness.store.find_peer_states(1, &[10]).await.unwrap()[0];
    assert_eq!(state.unread_count, 3);
    assert_eq!(
        state.unread_count,
        harness.store.count_unread(1, 10, state.in_read).await.unwrap()
    );

    // Reading up to remote id 3 leaves exactly one unread...
    harness
        .engine
        .handle_read_updates(
            1,
            Vec::new(),
            vec![InputReadUpdate {
                peer_id: 10,
                message_id: 3,
                unread_count: 1,
            }],
        )
        .await
        .unwrap();

    // ...and the next insert recomputes from the marker instead of adding up.
    harness
        .engine
        .insert_messages(1, vec![inbound(10, 5)])
        .await
        .unwrap();
    let state = &harness.store.find_peer_states(1, &[10]).await.unwrap()[0];
    assert_eq!(state.unread_count, 2); // remote 4 and 5
    assert_eq!(
        state.unread_count,
        harness.store.count_unread(1, 10, state.in_read).await.unwrap()
    );
}

#[tokio::test]
async fn deleting_the_last_message_deletes_the_peer_exactly_once() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .apply_peer_patches(1, &[PeerPatch::new(10).with_unread_count(0)])
        .await
        .unwrap();
    harness
        .engine
        .insert_messages(1, vec![inbound(10, 1)])
        .await
        .unwrap();
    let row = &harness.store.find_by_remote_ids(1, 10, &[1]).await.unwrap()[0];

    let mut deletions = harness.engine.observe_peer_deleting();
    let mut peer_updates = harness.engine.observe_peer_updates();

    harness
        .engine
        .apply_message_patches(1, &[MessagePatch::new(row.id, 10).with_deletion(true, false)])
        .await
        .unwrap();

    let deleted = recv(&mut deletions).await;
    assert_eq!(deleted.peer_id, 10);
    assert!(deletions.try_recv().is_err(), "exactly one deletion event");
    assert!(
        peer_updates.try_recv().is_err(),
        "no peer updates after the peer is gone"
    );
    assert!(harness.store.find_peer(1, 10).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_one_message_advances_the_last_message_pointer() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .apply_peer_patches(1, &[PeerPatch::new(10).with_unread_count(0)])
        .await
        .unwrap();
    harness
        .engine
        .insert_messages(1, vec![inbound(10, 1), inbound(10, 2)])
        .await
        .unwrap();
    let older = &harness.store.find_by_remote_ids(1, 10, &[1]).await.unwrap()[0];
    let newer = &harness.store.find_by_remote_ids(1, 10, &[2]).await.unwrap()[0];

    let mut peer_updates = harness.engine.observe_peer_updates();
    harness
        .engine
        .apply_message_patches(
            1,
            &[MessagePatch::new(newer.id, 10).with_deletion(true, false)],
        )
        .await
        .unwrap();

    let updates = recv(&mut peer_updates).await;
    assert_eq!(updates[0].last_message.unwrap().message_id, older.id);

    let state = &harness.store.find_peer_states(1, &[10]).await.unwrap()[0];
    assert_eq!(state.last_message_id, Some(older.id));
}

#[tokio::test]
async fn flag_pushes_translate_into_patches() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .insert_messages(1, vec![inbound(10, 7)])
        .await
        .unwrap();
    let row = &harness.store.find_by_remote_ids(1, 10, &[7]).await.unwrap()[0];

    harness
        .engine
        .handle_flags_updates(
            1,
            vec![FlagsSetUpdate {
                message_id: 7,
                peer_id: 10,
                mask: FLAG_IMPORTANT,
            }],
            Vec::new(),
        )
        .await
        .unwrap();
    let message = &harness.store.find_by_ids(1, &[row.id]).await.unwrap()[0];
    assert!(message.important);

    harness
        .engine
        .handle_flags_updates(
            1,
            vec![FlagsSetUpdate {
                message_id: 7,
                peer_id: 10,
                mask: FLAG_DELETED,
            }],
            vec![FlagsResetUpdate {
                message_id: 7,
                peer_id: 10,
                mask: FLAG_IMPORTANT,
            }],
        )
        .await
        .unwrap();
    let message = &harness.store.find_by_ids(1, &[row.id]).await.unwrap()[0];
    assert!(message.deleted);
    assert!(!message.important);
}

#[tokio::test]
async fn self_chat_read_update_advances_both_markers() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .handle_read_updates(
            1,
            vec![OutputReadUpdate {
                peer_id: 10,
                message_id: 4,
            }],
            vec![InputReadUpdate {
                peer_id: 1, // the account's own notes conversation
                message_id: 9,
                unread_count: 0,
            }],
        )
        .await
        .unwrap();

    let states = harness.store.find_peer_states(1, &[10, 1]).await.unwrap();
    let other = states.iter().find(|s| s.peer_id == 10).unwrap();
    assert_eq!(other.out_read, 4);
    assert_eq!(other.in_read, 0);

    let own = states.iter().find(|s| s.peer_id == 1).unwrap();
    assert_eq!(own.in_read, 9);
    assert_eq!(own.out_read, 9);
}

#[tokio::test]
async fn typing_and_badge_updates() {
    let harness = Harness::new(vec![1]);
    let mut typing = harness.engine.observe_text_write();

    harness.engine.handle_write_updates(
        1,
        vec![WriteTextUpdate {
            peer_id: 10,
            from_ids: vec![5],
            is_text: true,
        }],
    );
    let events = recv(&mut typing).await;
    assert_eq!(events[0].peer_id, 10);
    assert_eq!(events[0].from_ids, vec![5]);

    harness
        .engine
        .handle_badge_updates(1, vec![BadgeCountUpdate { count: 12 }])
        .await
        .unwrap();
    assert_eq!(harness.store.unread_dialogs_count(1).await.unwrap(), 12);
}

#[tokio::test]
async fn patch_event_lists_preserve_patch_order() {
    let harness = Harness::new(vec![1]);
    harness
        .engine
        .insert_messages(1, vec![inbound(10, 1), inbound(10, 2), inbound(10, 3)])
        .await
        .unwrap();
    let rows = harness.store.find_by_remote_ids(1, 10, &[1, 2, 3]).await.unwrap();
    let mut ids: Vec<_> = rows.iter().map(|m| m.id).collect();
    ids.sort_unstable();

    let mut updates_rx = harness.engine.observe_message_updates();
    let patches: Vec<MessagePatch> = ids
        .iter()
        .map(|id| MessagePatch::new(*id, 10).with_important(true))
        .collect();
    harness.engine.apply_message_patches(1, &patches).await.unwrap();

    let updates = recv(&mut updates_rx).await;
    let update_ids: Vec<_> = updates.iter().map(|u| u.message_id).collect();
    assert_eq!(update_ids, ids, "one multicast, in patch order");
}
