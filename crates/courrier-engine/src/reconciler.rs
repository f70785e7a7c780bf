//! Patch application and event publication.
//!
//! Every mutation, whether a local UI action, a push notification or a
//! delivery result, becomes a patch batch applied here.  Each call persists its patches,
//! derives one typed update per patch, and publishes the whole list in a
//! single multicast.  Deletions additionally re-derive the peer's
//! last-message pointer through the same patch path, so peer state after
//! bulk deletion is a fixed point of repeated patch application.

use std::collections::BTreeSet;

use tracing::debug;

use courrier_net::dto::MessageDto;
use courrier_net::push::{
    has_flag, BadgeCountUpdate, FlagsResetUpdate, FlagsSetUpdate, InputReadUpdate,
    OutputReadUpdate, ReactionChangeUpdate, WriteTextUpdate, FLAG_DELETED, FLAG_DELETED_FOR_ALL,
    FLAG_IMPORTANT,
};
use courrier_shared::ids::{AccountId, CmId, MessageId, PeerId, RemoteId};
use courrier_shared::message::{Message, MessageStatus};
use courrier_shared::patch::{MessagePatch, PeerPatch, ReactionPatch};
use courrier_shared::update::{
    DeleteUpdate, ImportantUpdate, LastMessageUpdate, MessageUpdate, PeerDeleting, PeerUpdate,
    PinUpdate, ReactionUpdate, ReadUpdate, StatusUpdate, TitleUpdate, UnreadUpdate, WriteText,
};
use courrier_store::StoreError;

use crate::engine::EngineInner;
use crate::error::Result;
use crate::mapper::map_message;

fn message_patch_to_update(account_id: AccountId, patch: &MessagePatch) -> MessageUpdate {
    let mut update = MessageUpdate::new(account_id, patch.message_id);
    if let Some(deletion) = &patch.deletion {
        update.deletion = Some(DeleteUpdate {
            deleted: deletion.deleted,
            deleted_for_all: deletion.deleted_for_all,
        });
    }
    if let Some(important) = &patch.important {
        update.important = Some(ImportantUpdate {
            important: important.important,
        });
    }
    if let Some(reaction) = &patch.reaction {
        update.reaction = Some(ReactionUpdate {
            peer_id: patch.peer_id,
            keep_my_reaction: reaction.keep_my_reaction,
            my_reaction: reaction.my_reaction,
            reactions: reaction.reactions.clone(),
        });
    }
    update
}

fn peer_patch_to_update(account_id: AccountId, patch: &PeerPatch) -> PeerUpdate {
    let mut update = PeerUpdate::new(account_id, patch.peer_id);
    if let Some(marker) = &patch.in_read {
        update.read_in = Some(ReadUpdate {
            message_id: marker.id,
        });
    }
    if let Some(marker) = &patch.out_read {
        update.read_out = Some(ReadUpdate {
            message_id: marker.id,
        });
    }
    if let Some(last) = &patch.last_message {
        update.last_message = Some(LastMessageUpdate {
            message_id: last.id,
        });
    }
    if let Some(unread) = &patch.unread {
        update.unread = Some(UnreadUpdate {
            count: unread.count,
        });
    }
    if let Some(title) = &patch.title {
        update.title = Some(TitleUpdate {
            title: title.title.clone(),
        });
    }
    if let Some(pin) = &patch.pin {
        update.pin = Some(PinUpdate {
            pinned_message_id: pin.pinned.as_ref().map(|m| m.id),
        });
    }
    update
}

impl EngineInner {
    /// Persist message patches, re-derive peer pointers for deletions, and
    /// publish one aggregated update list.
    pub(crate) async fn apply_message_patches(
        &self,
        account_id: AccountId,
        patches: &[MessagePatch],
    ) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }
        let updates: Vec<MessageUpdate> = patches
            .iter()
            .map(|p| message_patch_to_update(account_id, p))
            .collect();
        let require_invalidate: BTreeSet<PeerId> = patches
            .iter()
            .filter(|p| p.deletion.is_some())
            .map(|p| p.peer_id)
            .collect();

        self.stores.messages.apply_patches(account_id, patches).await?;
        for peer_id in require_invalidate {
            self.invalidate_peer_last_message(account_id, peer_id).await?;
        }
        self.bus.publish_message_updates(updates);
        Ok(())
    }

    /// Re-derive a peer's last-message pointer after deletions.  A peer with
    /// no remaining delivered message is removed outright.
    pub(crate) async fn invalidate_peer_last_message(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<()> {
        match self
            .stores
            .messages
            .find_last_sent_message_id_for_peer(account_id, peer_id)
            .await?
        {
            None => {
                self.stores.peers.remove_peer(account_id, peer_id).await?;
                self.bus.publish_peer_deleting(PeerDeleting {
                    account_id,
                    peer_id,
                });
            }
            Some(last_id) => {
                let patch = PeerPatch::new(peer_id).with_last_message(last_id);
                self.apply_peer_patches(account_id, &[patch]).await?;
            }
        }
        Ok(())
    }

    /// Persist peer patches and publish one aggregated update list.
    pub(crate) async fn apply_peer_patches(
        &self,
        account_id: AccountId,
        patches: &[PeerPatch],
    ) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }
        let updates: Vec<PeerUpdate> = patches
            .iter()
            .map(|p| peer_patch_to_update(account_id, p))
            .collect();
        self.stores.peers.apply_patches(account_id, patches).await?;
        self.bus.publish_peer_updates(updates);
        Ok(())
    }

    /// Advance a message's delivery status and publish the transition.  A
    /// row that no longer exists is not an error (an update touching zero
    /// rows is a no-op), but the transition is still announced.
    pub(crate) async fn change_message_status(
        &self,
        account_id: AccountId,
        message_id: MessageId,
        status: MessageStatus,
        remote_id: Option<RemoteId>,
        conversation_message_id: Option<CmId>,
    ) -> Result<()> {
        match self
            .stores
            .messages
            .change_message_status(account_id, message_id, status, remote_id, conversation_message_id)
            .await
        {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        let mut update = MessageUpdate::new(account_id, message_id);
        update.status = Some(StatusUpdate { status, remote_id });
        self.bus.publish_message_updates(vec![update]);
        Ok(())
    }

    pub(crate) async fn enqueue_again(
        &self,
        account_id: AccountId,
        message_id: MessageId,
    ) -> Result<()> {
        self.change_message_status(account_id, message_id, MessageStatus::Queue, None, None)
            .await
    }

    pub(crate) async fn enqueue_again_list(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<()> {
        self.stores
            .messages
            .change_messages_status(account_id, ids, MessageStatus::Queue)
            .await?;
        let updates: Vec<MessageUpdate> = ids
            .iter()
            .map(|id| {
                let mut update = MessageUpdate::new(account_id, *id);
                update.status = Some(StatusUpdate {
                    status: MessageStatus::Queue,
                    remote_id: None,
                });
                update
            })
            .collect();
        self.bus.publish_message_updates(updates);
        Ok(())
    }

    // -- Push handlers ------------------------------------------------------
    //
    // Remote push notifications translate into the same patch types local
    // mutations use; from here down there is exactly one reconciliation
    // path regardless of mutation origin.

    pub(crate) async fn handle_flags_updates(
        &self,
        account_id: AccountId,
        set_updates: Vec<FlagsSetUpdate>,
        reset_updates: Vec<FlagsResetUpdate>,
    ) -> Result<()> {
        let mut patches: Vec<MessagePatch> = Vec::new();
        for update in set_updates {
            if !has_flag(update.mask, FLAG_DELETED)
                && !has_flag(update.mask, FLAG_IMPORTANT)
                && !has_flag(update.mask, FLAG_DELETED_FOR_ALL)
            {
                continue;
            }
            let Some(local_id) = self
                .local_id_for_remote(account_id, update.peer_id, update.message_id)
                .await?
            else {
                continue;
            };
            let mut patch = MessagePatch::new(local_id, update.peer_id);
            if has_flag(update.mask, FLAG_DELETED) {
                let for_all = has_flag(update.mask, FLAG_DELETED_FOR_ALL);
                patch = patch.with_deletion(true, for_all);
            }
            if has_flag(update.mask, FLAG_IMPORTANT) {
                patch = patch.with_important(true);
            }
            patches.push(patch);
        }
        for update in reset_updates {
            if !has_flag(update.mask, FLAG_DELETED) && !has_flag(update.mask, FLAG_IMPORTANT) {
                continue;
            }
            let Some(local_id) = self
                .local_id_for_remote(account_id, update.peer_id, update.message_id)
                .await?
            else {
                continue;
            };
            let mut patch = MessagePatch::new(local_id, update.peer_id);
            if has_flag(update.mask, FLAG_DELETED) {
                patch = patch.with_deletion(false, false);
            }
            if has_flag(update.mask, FLAG_IMPORTANT) {
                patch = patch.with_important(false);
            }
            patches.push(patch);
        }
        self.apply_message_patches(account_id, &patches).await
    }

    pub(crate) async fn handle_read_updates(
        &self,
        account_id: AccountId,
        out_updates: Vec<OutputReadUpdate>,
        in_updates: Vec<InputReadUpdate>,
    ) -> Result<()> {
        let mut patches: Vec<PeerPatch> = Vec::new();
        for update in out_updates {
            patches.push(PeerPatch::new(update.peer_id).with_out_read(update.message_id));
        }
        for update in in_updates {
            let mut patch = PeerPatch::new(update.peer_id)
                .with_in_read(update.message_id)
                .with_unread_count(update.unread_count);
            if update.peer_id == account_id {
                // Self-chat: reading our own notes advances both markers.
                patch = patch.with_out_read(update.message_id);
            }
            patches.push(patch);
        }
        self.apply_peer_patches(account_id, &patches).await
    }

    pub(crate) async fn handle_reaction_updates(
        &self,
        account_id: AccountId,
        updates: Vec<ReactionChangeUpdate>,
    ) -> Result<()> {
        let mut patches: Vec<MessagePatch> = Vec::new();
        for update in updates {
            let Some(local_id) = self
                .local_id_for_remote(account_id, update.peer_id, update.message_id)
                .await?
            else {
                continue;
            };
            patches.push(
                MessagePatch::new(local_id, update.peer_id).with_reaction(ReactionPatch {
                    keep_my_reaction: !update.my_reaction_changed,
                    my_reaction: update.my_reaction,
                    reactions: update.reactions,
                }),
            );
        }
        self.apply_message_patches(account_id, &patches).await
    }

    pub(crate) fn handle_write_updates(
        &self,
        account_id: AccountId,
        updates: Vec<WriteTextUpdate>,
    ) {
        let events: Vec<WriteText> = updates
            .into_iter()
            .map(|u| WriteText {
                account_id,
                peer_id: u.peer_id,
                from_ids: u.from_ids,
                is_text: u.is_text,
            })
            .collect();
        self.bus.publish_write_text(events);
    }

    pub(crate) async fn handle_badge_updates(
        &self,
        account_id: AccountId,
        updates: Vec<BadgeCountUpdate>,
    ) -> Result<()> {
        for update in updates {
            self.stores
                .peers
                .set_unread_dialogs_count(account_id, update.count)
                .await?;
        }
        Ok(())
    }

    /// Persist pushed messages (deduplicated by remote id) and fold the
    /// affected peers' aggregates through the patch path.  The unread count
    /// is recomputed from inbound non-deleted rows above the in-read marker,
    /// never incremented in place.
    pub(crate) async fn insert_messages(
        &self,
        account_id: AccountId,
        dtos: Vec<MessageDto>,
    ) -> Result<()> {
        if dtos.is_empty() {
            return Ok(());
        }
        let messages: Vec<Message> = dtos.into_iter().map(map_message).collect();
        let local_ids = self
            .stores
            .messages
            .insert_many(account_id, messages.clone())
            .await?;

        let peer_ids: Vec<PeerId> = messages
            .iter()
            .map(|m| m.peer_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let states = self
            .stores
            .peers
            .find_peer_states(account_id, &peer_ids)
            .await?;
        debug!(
            inserted = local_ids.len(),
            peers = states.len(),
            "folding pushed messages into peer state"
        );

        let mut patches: Vec<PeerPatch> = Vec::with_capacity(states.len());
        for state in states {
            let mut last = state.last_message_id.unwrap_or(0);
            for (local_id, message) in local_ids.iter().zip(&messages) {
                if message.peer_id == state.peer_id && *local_id > last {
                    last = *local_id;
                }
            }
            let unread = self
                .stores
                .messages
                .count_unread(account_id, state.peer_id, state.in_read)
                .await?;
            patches.push(
                PeerPatch::new(state.peer_id)
                    .with_unread_count(unread)
                    .with_last_message(last),
            );
        }
        self.apply_peer_patches(account_id, &patches).await
    }

    async fn local_id_for_remote(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        remote_id: RemoteId,
    ) -> Result<Option<MessageId>> {
        let rows = self
            .stores
            .messages
            .find_by_remote_ids(account_id, peer_id, &[remote_id])
            .await?;
        Ok(rows.first().map(|m| m.id))
    }
}
