//! In-memory reference implementation of the store contracts.
//!
//! Used by the engine's tests and by embedders without a relational backend.
//! Every trait method takes the single process-wide lock for the duration of
//! the call, which gives the same observable behavior as the per-call
//! transactions the contracts require: patches to different entities never
//! interleave with each other's read-modify-write.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use courrier_shared::crypt::{KeyLocationPolicy, SessionKeyPair};
use courrier_shared::ids::{AccountId, CmId, MessageId, PeerId, RemoteId, SessionId};
use courrier_shared::message::{Message, MessageStatus};
use courrier_shared::owner::{Community, User};
use courrier_shared::patch::{MessagePatch, PeerPatch};
use courrier_shared::peer::{Keyboard, Peer, PeerState};

use crate::criteria::{DialogsCriteria, MessagesCriteria};
use crate::error::{Result, StoreError};
use crate::keys::KeysStore;
use crate::messages::{ForwardInfo, MessagesStore};
use crate::owners::OwnersStore;
use crate::peers::PeersStore;

#[derive(Default)]
struct Inner {
    next_message_id: MessageId,
    messages: BTreeMap<(AccountId, MessageId), Message>,
    peers: HashMap<(AccountId, PeerId), Peer>,
    users: HashMap<(AccountId, i64), User>,
    communities: HashMap<(AccountId, i64), Community>,
    keys: Vec<(KeyLocationPolicy, SessionKeyPair)>,
    unread_badges: HashMap<AccountId, u32>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn next_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        self.next_message_id
    }

    fn insert_one(&mut self, account_id: AccountId, mut message: Message) -> MessageId {
        // Dedup by remote id: a remote message already known keeps its row.
        if message.remote_id != 0 {
            let existing = self
                .messages
                .iter()
                .find(|((acc, _), m)| {
                    *acc == account_id
                        && m.peer_id == message.peer_id
                        && m.remote_id == message.remote_id
                })
                .map(|((_, id), _)| *id);
            if let Some(id) = existing {
                message.id = id;
                self.messages.insert((account_id, id), message);
                return id;
            }
        }
        let id = self.next_id();
        message.id = id;
        self.messages.insert((account_id, id), message);
        id
    }

    fn apply_message_patch(message: &mut Message, patch: &MessagePatch) {
        if let Some(deletion) = &patch.deletion {
            message.deleted = deletion.deleted;
            message.deleted_for_all = deletion.deleted_for_all;
        }
        if let Some(important) = &patch.important {
            message.important = important.important;
        }
        if let Some(reaction) = &patch.reaction {
            if !reaction.keep_my_reaction {
                message.my_reaction = reaction.my_reaction;
            }
            message.reactions = reaction.reactions.clone();
        }
    }

    fn apply_peer_patch(peer: &mut Peer, patch: &PeerPatch) {
        if let Some(marker) = &patch.in_read {
            peer.in_read = marker.id;
        }
        if let Some(marker) = &patch.out_read {
            peer.out_read = marker.id;
        }
        if let Some(unread) = &patch.unread {
            peer.unread_count = unread.count;
        }
        if let Some(last) = &patch.last_message {
            peer.last_message_id = Some(last.id);
        }
        if let Some(title) = &patch.title {
            peer.title = title.title.clone();
        }
        if let Some(pin) = &patch.pin {
            peer.pinned = pin.pinned.clone();
        }
    }
}

#[async_trait]
impl MessagesStore for MemoryStore {
    async fn upsert_draft(
        &self,
        account_id: AccountId,
        draft_id: Option<MessageId>,
        mut message: Message,
    ) -> Result<MessageId> {
        let mut inner = self.inner.lock().unwrap();
        match draft_id {
            Some(id) => {
                if !inner.messages.contains_key(&(account_id, id)) {
                    return Err(StoreError::NotFound);
                }
                message.id = id;
                inner.messages.insert((account_id, id), message);
                Ok(id)
            }
            None => {
                let id = inner.next_id();
                message.id = id;
                inner.messages.insert((account_id, id), message);
                Ok(id)
            }
        }
    }

    async fn insert_many(
        &self,
        account_id: AccountId,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageId>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(messages
            .into_iter()
            .map(|m| inner.insert_one(account_id, m))
            .collect())
    }

    async fn insert_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        messages: Vec<Message>,
        clear_before: bool,
    ) -> Result<Vec<MessageId>> {
        let mut inner = self.inner.lock().unwrap();
        if clear_before {
            // Drop the cached (delivered) history; in-flight local messages
            // survive so the send queue never loses them.
            inner.messages.retain(|(acc, _), m| {
                !(*acc == account_id && m.peer_id == peer_id && m.status == MessageStatus::Sent)
            });
        }
        Ok(messages
            .into_iter()
            .map(|m| inner.insert_one(account_id, m))
            .collect())
    }

    async fn find_by_ids(&self, account_id: AccountId, ids: &[MessageId]) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.messages.get(&(account_id, *id)).cloned())
            .collect())
    }

    async fn find_by_remote_ids(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        remote_ids: &[RemoteId],
    ) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|((acc, _), m)| {
                *acc == account_id
                    && m.peer_id == peer_id
                    && m.remote_id != 0
                    && remote_ids.contains(&m.remote_id)
            })
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn get_by_criteria(&self, criteria: MessagesCriteria) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Message> = inner
            .messages
            .iter()
            .filter(|((acc, id), m)| {
                *acc == criteria.account_id
                    && m.peer_id == criteria.peer_id
                    && (criteria.include_deleted || !m.deleted)
                    && criteria.below_id.map_or(true, |below| *id < below)
            })
            .map(|(_, m)| m.clone())
            .collect();
        rows.sort_by_key(|m| m.id);
        if let Some(limit) = criteria.limit {
            // Keep the most recent window, still ascending.
            if rows.len() > limit {
                rows.drain(..rows.len() - limit);
            }
        }
        Ok(rows)
    }

    async fn get_message_status(
        &self,
        account_id: AccountId,
        message_id: MessageId,
    ) -> Result<MessageStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .messages
            .get(&(account_id, message_id))
            .map(|m| m.status)
            .ok_or(StoreError::NotFound)
    }

    async fn change_message_status(
        &self,
        account_id: AccountId,
        message_id: MessageId,
        status: MessageStatus,
        remote_id: Option<RemoteId>,
        conversation_message_id: Option<CmId>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let message = inner
            .messages
            .get_mut(&(account_id, message_id))
            .ok_or(StoreError::NotFound)?;
        message.status = status;
        if let Some(remote_id) = remote_id {
            message.remote_id = remote_id;
        }
        if let Some(cmid) = conversation_message_id {
            message.conversation_message_id = cmid;
        }
        Ok(())
    }

    async fn change_messages_status(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
        status: MessageStatus,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for id in ids {
            if let Some(message) = inner.messages.get_mut(&(account_id, *id)) {
                message.status = status;
            }
        }
        Ok(())
    }

    async fn find_first_unsent_message(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Option<(AccountId, Message)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|((acc, _), m)| {
                account_ids.contains(acc) && m.status == MessageStatus::Queue && !m.deleted
            })
            .min_by_key(|((_, id), _)| *id)
            .map(|((acc, _), m)| (*acc, m.clone())))
    }

    async fn find_last_sent_message_id_for_peer(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<Option<MessageId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|((acc, _), m)| {
                *acc == account_id
                    && m.peer_id == peer_id
                    && m.status == MessageStatus::Sent
                    && !m.deleted
            })
            .map(|((_, id), _)| *id)
            .max())
    }

    async fn apply_patches(&self, account_id: AccountId, patches: &[MessagePatch]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for patch in patches {
            if let Some(message) = inner.messages.get_mut(&(account_id, patch.message_id)) {
                Inner::apply_message_patch(message, patch);
            }
        }
        Ok(())
    }

    async fn forward_info(
        &self,
        account_id: AccountId,
        message_id: MessageId,
        peer_id: PeerId,
    ) -> Result<ForwardInfo> {
        let inner = self.inner.lock().unwrap();
        let message = inner
            .messages
            .get(&(account_id, message_id))
            .ok_or(StoreError::NotFound)?;

        // Look up every forwarded message again: its remote id may have been
        // assigned after the subtree was captured.
        let mut resolved: Vec<(PeerId, RemoteId)> = Vec::with_capacity(message.forward_count as usize);
        for fwd in &message.forward_messages {
            let current = inner
                .messages
                .get(&(account_id, fwd.id))
                .map(|m| (m.peer_id, m.remote_id))
                .unwrap_or((fwd.peer_id, fwd.remote_id));
            resolved.push(current);
        }

        let unresolved = resolved.iter().filter(|(_, rid)| *rid == 0).count();
        if resolved.len() == 1 && resolved[0].0 == peer_id {
            return Ok(ForwardInfo {
                reply_to: Some(resolved[0].1),
                message_ids: Vec::new(),
                unresolved,
            });
        }
        Ok(ForwardInfo {
            reply_to: None,
            message_ids: resolved.into_iter().map(|(_, rid)| rid).collect(),
            unresolved,
        })
    }

    async fn count_unread(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        in_read: RemoteId,
    ) -> Result<u32> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .filter(|((acc, _), m)| {
                *acc == account_id
                    && m.peer_id == peer_id
                    && !m.out
                    && !m.deleted
                    && m.remote_id > in_read
            })
            .count() as u32)
    }
}

#[async_trait]
impl PeersStore for MemoryStore {
    async fn upsert_peers(
        &self,
        account_id: AccountId,
        peers: Vec<Peer>,
        clear_before: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if clear_before {
            inner.peers.retain(|(acc, _), _| *acc != account_id);
        }
        for peer in peers {
            inner.peers.insert((account_id, peer.id), peer);
        }
        Ok(())
    }

    async fn find_peer(&self, account_id: AccountId, peer_id: PeerId) -> Result<Option<Peer>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.peers.get(&(account_id, peer_id)).cloned())
    }

    async fn get_peers(&self, criteria: DialogsCriteria) -> Result<Vec<Peer>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Peer> = inner
            .peers
            .iter()
            .filter(|((acc, _), _)| *acc == criteria.account_id)
            .map(|(_, p)| p.clone())
            .collect();
        rows.sort_by(|a, b| {
            (b.major_order, b.minor_order, b.last_message_id)
                .cmp(&(a.major_order, a.minor_order, a.last_message_id))
        });
        if let Some(limit) = criteria.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn find_peer_states(
        &self,
        account_id: AccountId,
        peer_ids: &[PeerId],
    ) -> Result<Vec<PeerState>> {
        let inner = self.inner.lock().unwrap();
        Ok(peer_ids
            .iter()
            .filter_map(|peer_id| inner.peers.get(&(account_id, *peer_id)))
            .map(|p| PeerState {
                peer_id: p.id,
                last_message_id: p.last_message_id,
                unread_count: p.unread_count,
                in_read: p.in_read,
                out_read: p.out_read,
            })
            .collect())
    }

    async fn apply_patches(&self, account_id: AccountId, patches: &[PeerPatch]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for patch in patches {
            let peer = inner
                .peers
                .entry((account_id, patch.peer_id))
                .or_insert_with(|| Peer::new(patch.peer_id));
            Inner::apply_peer_patch(peer, patch);
        }
        Ok(())
    }

    async fn remove_peer(&self, account_id: AccountId, peer_id: PeerId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.peers.remove(&(account_id, peer_id));
        Ok(())
    }

    async fn update_keyboard(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let peer = inner
            .peers
            .entry((account_id, peer_id))
            .or_insert_with(|| Peer::new(peer_id));
        peer.keyboard = keyboard;
        Ok(())
    }

    async fn set_unread_dialogs_count(&self, account_id: AccountId, count: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.unread_badges.insert(account_id, count);
        Ok(())
    }

    async fn unread_dialogs_count(&self, account_id: AccountId) -> Result<u32> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.unread_badges.get(&account_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl OwnersStore for MemoryStore {
    async fn find_users(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(&(account_id, *id)).cloned())
            .collect())
    }

    async fn find_communities(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<Community>> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.communities.get(&(account_id, *id)).cloned())
            .collect())
    }

    async fn store_users(&self, account_id: AccountId, users: Vec<User>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for user in users {
            inner.users.insert((account_id, user.id), user);
        }
        Ok(())
    }

    async fn store_communities(
        &self,
        account_id: AccountId,
        communities: Vec<Community>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for community in communities {
            inner.communities.insert((account_id, community.id), community);
        }
        Ok(())
    }
}

#[async_trait]
impl KeysStore for MemoryStore {
    async fn save_key_pair(&self, policy: KeyLocationPolicy, pair: SessionKeyPair) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.keys.iter().any(|(p, existing)| {
            *p == policy
                && existing.account_id == pair.account_id
                && existing.session_id == pair.session_id
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "key pair for session {} already saved",
                pair.session_id
            )));
        }
        inner.keys.push((policy, pair));
        Ok(())
    }

    async fn find_key_pair(
        &self,
        policy: KeyLocationPolicy,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<Option<SessionKeyPair>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .keys
            .iter()
            .find(|(p, pair)| {
                *p == policy && pair.account_id == account_id && pair.session_id == session_id
            })
            .map(|(_, pair)| pair.clone()))
    }

    async fn find_last_key_pair(
        &self,
        policy: KeyLocationPolicy,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<Option<SessionKeyPair>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .keys
            .iter()
            .rev()
            .find(|(p, pair)| {
                *p == policy && pair.account_id == account_id && pair.peer_id == peer_id
            })
            .map(|(_, pair)| pair.clone()))
    }
}
