//! Read paths and remote-acknowledged mutations.
//!
//! Everything inbound flows the same way: fetch (or read the cache), map
//! into replica entities, resolve the referenced owners through the cache,
//! decrypt what is encrypted, and fold conversation state through the patch
//! path.  Mutations call the remote first and patch the replica only with
//! what the service acknowledged.

use tracing::debug;

use courrier_net::dto::{token_for, AttachmentToken, OwnerSidecar};
use courrier_shared::ids::{is_group, is_user, peer_kind, AccountId, MessageId, PeerId, PeerKind, RemoteId};
use courrier_shared::message::Message;
use courrier_shared::owner::{Owner, OwnersBundle};
use courrier_shared::patch::{MessagePatch, PeerPatch};
use courrier_shared::peer::{Keyboard, Peer};
use courrier_shared::update::PeerDeleting;
use courrier_shared::attachment::Attachment;
use courrier_store::{DialogsCriteria, MessagesCriteria};

use std::collections::HashMap;

use crate::engine::EngineInner;
use crate::error::{EngineError, Result};
use crate::mapper::{collect_owner_ids, map_conversation, map_message};
use crate::owners::Mode;

/// Messages together with the participants they reference, resolved for
/// this one call.
#[derive(Debug)]
pub struct MessagesPage {
    pub messages: Vec<Message>,
    pub owners: OwnersBundle,
}

/// A conversation-list entry.
#[derive(Debug)]
pub struct Dialog {
    pub peer: Peer,
    pub last_message: Option<Message>,
    pub interlocutor: Option<Owner>,
}

/// A single resolved conversation.
#[derive(Debug)]
pub struct Conversation {
    pub peer: Peer,
    pub interlocutor: Option<Owner>,
}

fn owners_from_sidecar(sidecar: OwnerSidecar) -> Vec<Owner> {
    let mut owners: Vec<Owner> = Vec::with_capacity(sidecar.users.len() + sidecar.communities.len());
    owners.extend(sidecar.users.into_iter().map(Owner::User));
    owners.extend(sidecar.communities.into_iter().map(Owner::Community));
    owners
}

impl EngineInner {
    /// Resolve owners for a message batch and decrypt it.
    async fn load_messages_page(
        &self,
        account_id: AccountId,
        messages: Vec<Message>,
        already_known: Vec<Owner>,
    ) -> Result<MessagesPage> {
        let ids = collect_owner_ids(&messages);
        let owners = self
            .resolver
            .resolve(account_id, &ids, Mode::Any, already_known)
            .await?;
        let messages = self.decryptor.decrypt_messages(account_id, messages).await;
        Ok(MessagesPage { messages, owners })
    }

    pub(crate) async fn get_cached_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<MessagesPage> {
        let rows = self
            .stores
            .messages
            .get_by_criteria(MessagesCriteria::new(account_id, peer_id))
            .await?;
        self.load_messages_page(account_id, rows, Vec::new()).await
    }

    pub(crate) async fn find_cached_messages(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<MessagesPage> {
        let rows = self.stores.messages.find_by_ids(account_id, ids).await?;
        self.load_messages_page(account_id, rows, Vec::new()).await
    }

    pub(crate) async fn get_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        count: u32,
        offset: Option<u32>,
        start_message_id: Option<RemoteId>,
        cache_data: bool,
        rev: bool,
    ) -> Result<MessagesPage> {
        let count = if rev { 200 } else { count };
        let response = self
            .remote
            .messages
            .get_history(account_id, peer_id, count, offset, start_message_id, rev)
            .await?;

        let mut dtos = response.messages;
        if let Some(start) = start_message_id {
            // The anchor message is included again; drop the duplicate.
            if dtos.first().map(|d| d.id) == Some(start) {
                dtos.remove(0);
            }
        }
        let already_known = owners_from_sidecar(response.owners);
        let mapped: Vec<Message> = dtos.into_iter().map(map_message).collect();

        if cache_data {
            let first_page = start_message_id.is_none();
            let local_ids = self
                .stores
                .messages
                .insert_peer_messages(account_id, peer_id, mapped.clone(), first_page)
                .await?;

            if first_page {
                if let Some(conversation) = response.conversation {
                    let mut patch = PeerPatch::new(peer_id)
                        .with_in_read(conversation.in_read)
                        .with_out_read(conversation.out_read)
                        .with_unread_count(conversation.unread_count);
                    if let Some(local_id) = mapped
                        .iter()
                        .zip(&local_ids)
                        .find(|(m, _)| m.remote_id == conversation.last_message_id)
                        .map(|(_, id)| *id)
                    {
                        patch = patch.with_last_message(local_id);
                    }
                    self.apply_peer_patches(account_id, &[patch]).await?;
                }
                // The cache is authoritative for the first page: re-read it
                // so local messages in statuses other than Sent are not lost
                // from the result.
                let rows = self
                    .stores
                    .messages
                    .get_by_criteria(MessagesCriteria::new(account_id, peer_id))
                    .await?;
                return self.load_messages_page(account_id, rows, already_known).await;
            }
        }

        self.load_messages_page(account_id, mapped, already_known).await
    }

    pub(crate) async fn get_dialogs(
        &self,
        account_id: AccountId,
        count: u32,
        start_message_id: Option<RemoteId>,
    ) -> Result<Vec<Dialog>> {
        let response = self
            .remote
            .messages
            .get_dialogs(account_id, count, start_message_id)
            .await?;
        let mut dtos = response.dialogs;
        if start_message_id.is_some() && !dtos.is_empty() {
            // Pagination anchors on the previous page's last dialog.
            dtos.remove(0);
        }
        let clear = start_message_id.is_none();

        self.stores
            .owners
            .store_users(account_id, response.owners.users.clone())
            .await?;
        self.stores
            .owners
            .store_communities(account_id, response.owners.communities.clone())
            .await?;
        let already_known = owners_from_sidecar(response.owners);

        let mut peers: Vec<Peer> = Vec::with_capacity(dtos.len());
        let mut last_messages: Vec<Option<Message>> = Vec::with_capacity(dtos.len());
        for dto in dtos {
            peers.push(map_conversation(dto.conversation));
            last_messages.push(dto.last_message.map(map_message));
        }

        // Cache the last messages in one batch and point the peers at the
        // resulting local rows.
        let present: Vec<usize> = last_messages
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|_| i))
            .collect();
        let batch: Vec<Message> = present
            .iter()
            .filter_map(|i| last_messages[*i].clone())
            .collect();
        let local_ids = self.stores.messages.insert_many(account_id, batch).await?;
        for (index, local_id) in present.iter().zip(&local_ids) {
            peers[*index].last_message_id = Some(*local_id);
            if let Some(message) = last_messages[*index].as_mut() {
                message.id = *local_id;
            }
        }

        self.stores
            .peers
            .upsert_peers(account_id, peers.clone(), clear)
            .await?;
        self.stores
            .peers
            .set_unread_dialogs_count(account_id, response.unread_count)
            .await?;
        debug!(dialogs = peers.len(), clear, "cached dialogs page");

        // Interlocutors: the peer itself for user/group conversations, the
        // last sender for chats and contacts.
        let mut ids: Vec<PeerId> = Vec::new();
        for (peer, last) in peers.iter().zip(&last_messages) {
            let id = match peer_kind(peer.id) {
                PeerKind::User | PeerKind::Group => Some(peer.id),
                PeerKind::Chat | PeerKind::Contact => last.as_ref().map(|m| m.from_id),
            };
            if let Some(id) = id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        let owners = self
            .resolver
            .resolve(account_id, &ids, Mode::Any, already_known)
            .await?;

        // Decrypt the encrypted last messages as one batch.
        let batch: Vec<Message> = present
            .iter()
            .filter_map(|i| last_messages[*i].take())
            .collect();
        let decrypted = self.decryptor.decrypt_messages(account_id, batch).await;
        for (index, message) in present.iter().zip(decrypted) {
            last_messages[*index] = Some(message);
        }

        let dialogs = peers
            .into_iter()
            .zip(last_messages)
            .map(|(peer, last_message)| {
                let interlocutor = match peer_kind(peer.id) {
                    PeerKind::User | PeerKind::Group => owners.get(peer.id).cloned(),
                    _ => last_message
                        .as_ref()
                        .and_then(|m| owners.get(m.from_id).cloned()),
                };
                Dialog {
                    peer,
                    last_message,
                    interlocutor,
                }
            })
            .collect();
        Ok(dialogs)
    }

    /// The conversation list as the replica knows it, no network involved
    /// beyond owner resolution.
    pub(crate) async fn get_cached_dialogs(&self, account_id: AccountId) -> Result<Vec<Dialog>> {
        let peers = self
            .stores
            .peers
            .get_peers(DialogsCriteria::new(account_id))
            .await?;
        let message_ids: Vec<MessageId> =
            peers.iter().filter_map(|p| p.last_message_id).collect();
        let rows = self
            .stores
            .messages
            .find_by_ids(account_id, &message_ids)
            .await?;
        let senders: HashMap<MessageId, PeerId> =
            rows.iter().map(|m| (m.id, m.from_id)).collect();

        let mut ids: Vec<PeerId> = Vec::new();
        for peer in &peers {
            let id = match peer_kind(peer.id) {
                PeerKind::User | PeerKind::Group => Some(peer.id),
                PeerKind::Chat | PeerKind::Contact => peer
                    .last_message_id
                    .and_then(|mid| senders.get(&mid).copied()),
            };
            if let Some(id) = id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        let owners = self
            .resolver
            .resolve(account_id, &ids, Mode::Any, Vec::new())
            .await?;

        let decrypted = self.decryptor.decrypt_messages(account_id, rows).await;
        let mut by_id: HashMap<MessageId, Message> =
            decrypted.into_iter().map(|m| (m.id, m)).collect();

        let dialogs = peers
            .into_iter()
            .map(|peer| {
                let last_message = peer.last_message_id.and_then(|mid| by_id.remove(&mid));
                let interlocutor = match peer_kind(peer.id) {
                    PeerKind::User | PeerKind::Group => owners.get(peer.id).cloned(),
                    _ => last_message
                        .as_ref()
                        .and_then(|m| owners.get(m.from_id).cloned()),
                };
                Dialog {
                    peer,
                    last_message,
                    interlocutor,
                }
            })
            .collect();
        Ok(dialogs)
    }

    pub(crate) async fn get_conversation(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        mode: Mode,
    ) -> Result<Conversation> {
        let peer = match mode {
            Mode::Cache => self
                .stores
                .peers
                .find_peer(account_id, peer_id)
                .await?
                .ok_or(EngineError::NotFound)?,
            Mode::Net => self.actual_conversation(account_id, peer_id).await?,
            Mode::Any => match self.stores.peers.find_peer(account_id, peer_id).await? {
                Some(peer) => peer,
                None => self.actual_conversation(account_id, peer_id).await?,
            },
        };
        self.conversation_view(account_id, peer).await
    }

    async fn actual_conversation(&self, account_id: AccountId, peer_id: PeerId) -> Result<Peer> {
        let response = self
            .remote
            .messages
            .get_conversations(account_id, &[peer_id])
            .await?;
        let dto = response
            .items
            .into_iter()
            .next()
            .ok_or(EngineError::NotFound)?;
        self.stores
            .owners
            .store_users(account_id, response.owners.users)
            .await?;
        self.stores
            .owners
            .store_communities(account_id, response.owners.communities)
            .await?;

        let last_remote = dto.last_message_id;
        let mut peer = map_conversation(dto);
        if last_remote != 0 {
            if let Some(row) = self
                .stores
                .messages
                .find_by_remote_ids(account_id, peer_id, &[last_remote])
                .await?
                .first()
            {
                peer.last_message_id = Some(row.id);
            }
        }
        self.stores
            .peers
            .upsert_peers(account_id, vec![peer.clone()], false)
            .await?;
        Ok(peer)
    }

    async fn conversation_view(&self, account_id: AccountId, peer: Peer) -> Result<Conversation> {
        let mut ids: Vec<PeerId> = Vec::new();
        if is_user(peer.id) || is_group(peer.id) {
            ids.push(peer.id);
        }
        if let Some(pinned) = &peer.pinned {
            if !ids.contains(&pinned.from_id) {
                ids.push(pinned.from_id);
            }
        }
        let owners = self
            .resolver
            .resolve(account_id, &ids, Mode::Any, Vec::new())
            .await?;
        let interlocutor = if is_user(peer.id) || is_group(peer.id) {
            owners.get(peer.id).cloned()
        } else {
            None
        };
        Ok(Conversation { peer, interlocutor })
    }

    // -- Remote-acknowledged mutations --------------------------------------

    pub(crate) async fn delete_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        ids: &[MessageId],
        for_all: bool,
        spam: bool,
    ) -> Result<()> {
        let rows = self.stores.messages.find_by_ids(account_id, ids).await?;
        let mut patches: Vec<MessagePatch> = Vec::with_capacity(rows.len());

        // Local-only rows need no network round trip.
        for row in rows.iter().filter(|m| m.remote_id == 0) {
            patches.push(MessagePatch::new(row.id, peer_id).with_deletion(true, false));
        }

        let remote_ids: Vec<RemoteId> = rows
            .iter()
            .filter(|m| m.remote_id != 0)
            .map(|m| m.remote_id)
            .collect();
        if !remote_ids.is_empty() {
            let acks = self
                .remote
                .messages
                .delete(account_id, &remote_ids, for_all, spam)
                .await?;
            for ack in acks.iter().filter(|a| a.ok) {
                if let Some(row) = rows.iter().find(|m| m.remote_id == ack.message_id) {
                    patches.push(MessagePatch::new(row.id, peer_id).with_deletion(true, for_all));
                }
            }
        }
        self.apply_message_patches(account_id, &patches).await
    }

    pub(crate) async fn restore_message(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        message_id: MessageId,
    ) -> Result<()> {
        let rows = self
            .stores
            .messages
            .find_by_ids(account_id, &[message_id])
            .await?;
        let row = rows.first().ok_or(EngineError::NotFound)?;
        if row.remote_id != 0 {
            self.remote.messages.restore(account_id, row.remote_id).await?;
        }
        self.apply_message_patches(
            account_id,
            &[MessagePatch::new(message_id, peer_id).with_deletion(false, false)],
        )
        .await
    }

    pub(crate) async fn mark_as_important(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        ids: &[MessageId],
        important: bool,
    ) -> Result<()> {
        let rows = self.stores.messages.find_by_ids(account_id, ids).await?;
        let remote_ids: Vec<RemoteId> = rows
            .iter()
            .filter(|m| m.remote_id != 0)
            .map(|m| m.remote_id)
            .collect();
        if remote_ids.is_empty() {
            return Ok(());
        }
        let acked = self
            .remote
            .messages
            .mark_important(account_id, &remote_ids, important)
            .await?;
        let patches: Vec<MessagePatch> = acked
            .iter()
            .filter_map(|remote_id| rows.iter().find(|m| m.remote_id == *remote_id))
            .map(|row| MessagePatch::new(row.id, peer_id).with_important(important))
            .collect();
        self.apply_message_patches(account_id, &patches).await
    }

    pub(crate) async fn mark_as_read(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        to_id: RemoteId,
    ) -> Result<()> {
        self.remote
            .messages
            .mark_read(account_id, peer_id, to_id)
            .await?;
        self.apply_peer_patches(
            account_id,
            &[PeerPatch::new(peer_id)
                .with_in_read(to_id)
                .with_unread_count(0)],
        )
        .await
    }

    pub(crate) async fn pin_message(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        message: Option<Message>,
    ) -> Result<()> {
        match &message {
            Some(m) if m.remote_id != 0 => {
                self.remote
                    .messages
                    .pin(account_id, peer_id, m.remote_id)
                    .await?;
            }
            Some(_) => return Err(EngineError::NotFound),
            None => {
                self.remote.messages.unpin(account_id, peer_id).await?;
            }
        }
        self.apply_peer_patches(account_id, &[PeerPatch::new(peer_id).with_pin(message)])
            .await
    }

    pub(crate) async fn delete_dialog(&self, account_id: AccountId, peer_id: PeerId) -> Result<()> {
        self.remote.messages.delete_dialog(account_id, peer_id).await?;
        self.stores.peers.remove_peer(account_id, peer_id).await?;
        self.stores
            .messages
            .insert_peer_messages(account_id, peer_id, Vec::new(), true)
            .await?;
        self.bus.publish_peer_deleting(PeerDeleting {
            account_id,
            peer_id,
        });
        Ok(())
    }

    pub(crate) async fn edit_message(
        &self,
        account_id: AccountId,
        message: &Message,
        text: Option<&str>,
        attachments: &[Attachment],
        keep_forwards: bool,
    ) -> Result<Message> {
        if message.remote_id == 0 {
            return Err(EngineError::NotFound);
        }
        let tokens: Vec<AttachmentToken> = attachments.iter().filter_map(token_for).collect();
        self.remote
            .messages
            .edit(
                account_id,
                message.peer_id,
                message.remote_id,
                text,
                &tokens,
                keep_forwards,
            )
            .await?;

        // Re-fetch the authoritative copy and fold it into the replica.
        let dtos = self
            .remote
            .messages
            .get_by_ids(account_id, &[message.remote_id])
            .await?;
        let dto = dtos.into_iter().next().ok_or(EngineError::NotFound)?;
        let local_ids = self
            .stores
            .messages
            .insert_many(account_id, vec![map_message(dto)])
            .await?;
        let rows = self.stores.messages.find_by_ids(account_id, &local_ids).await?;
        let mut decrypted = self.decryptor.decrypt_messages(account_id, rows).await;
        decrypted.pop().ok_or(EngineError::NotFound)
    }

    pub(crate) async fn update_dialog_keyboard(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.stores
            .peers
            .update_keyboard(account_id, peer_id, keyboard)
            .await?;
        Ok(())
    }
}
