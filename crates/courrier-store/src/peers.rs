//! Peer (conversation) store contract.

use async_trait::async_trait;

use courrier_shared::ids::{AccountId, PeerId};
use courrier_shared::patch::PeerPatch;
use courrier_shared::peer::{Keyboard, Peer, PeerState};

use crate::criteria::DialogsCriteria;
use crate::error::Result;

#[async_trait]
pub trait PeersStore: Send + Sync {
    /// Insert or replace conversation rows.  `clear_before` wipes the
    /// account's conversation list first (first page of a full refresh).
    async fn upsert_peers(
        &self,
        account_id: AccountId,
        peers: Vec<Peer>,
        clear_before: bool,
    ) -> Result<()>;

    async fn find_peer(&self, account_id: AccountId, peer_id: PeerId) -> Result<Option<Peer>>;

    async fn get_peers(&self, criteria: DialogsCriteria) -> Result<Vec<Peer>>;

    /// Aggregate projections for the peers that exist locally; unknown ids
    /// are absent from the result.
    async fn find_peer_states(
        &self,
        account_id: AccountId,
        peer_ids: &[PeerId],
    ) -> Result<Vec<PeerState>>;

    /// Apply a patch batch as an all-or-nothing unit.  A patch may arrive
    /// before the conversation page that creates the row; the row is then
    /// created sparse and patched.
    async fn apply_patches(&self, account_id: AccountId, patches: &[PeerPatch]) -> Result<()>;

    async fn remove_peer(&self, account_id: AccountId, peer_id: PeerId) -> Result<()>;

    async fn update_keyboard(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    /// Account-wide unread-conversations badge.
    async fn set_unread_dialogs_count(&self, account_id: AccountId, count: u32) -> Result<()>;

    async fn unread_dialogs_count(&self, account_id: AccountId) -> Result<u32>;
}
