//! Message store contract.

use async_trait::async_trait;

use courrier_shared::ids::{AccountId, CmId, MessageId, PeerId, RemoteId};
use courrier_shared::message::{Message, MessageStatus};
use courrier_shared::patch::MessagePatch;

use crate::criteria::MessagesCriteria;
use crate::error::Result;

/// Remote-id resolution of a message's forwarded subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardInfo {
    /// Set when the subtree is a single message of the same conversation,
    /// which the wire protocol sends as a reply instead of a forward.
    pub reply_to: Option<RemoteId>,
    /// Remote ids of the forwarded messages, in subtree order.
    pub message_ids: Vec<RemoteId>,
    /// How many forwarded messages have no remote id yet.
    pub unresolved: usize,
}

/// CRUD and range queries for the message table.
///
/// Messages are keyed by `(account id, local id)`.  Insertion of remote
/// messages deduplicates by `(peer id, remote id)`: re-inserting an already
/// known remote message overwrites the row but keeps its local id.
#[async_trait]
pub trait MessagesStore: Send + Sync {
    /// Insert or update a draft.  `draft_id` of `None` inserts a new row and
    /// assigns a local id; otherwise the existing row is replaced.
    async fn upsert_draft(
        &self,
        account_id: AccountId,
        draft_id: Option<MessageId>,
        message: Message,
    ) -> Result<MessageId>;

    /// Insert a batch of remote messages (any peers), deduplicating by
    /// remote id.  Returns local ids in input order.
    async fn insert_many(
        &self,
        account_id: AccountId,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageId>>;

    /// Replace (or extend) the cached slice of one conversation.
    async fn insert_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        messages: Vec<Message>,
        clear_before: bool,
    ) -> Result<Vec<MessageId>>;

    async fn find_by_ids(&self, account_id: AccountId, ids: &[MessageId]) -> Result<Vec<Message>>;

    /// Resolve remote ids to locally-known messages; unknown ids are simply
    /// absent from the result.
    async fn find_by_remote_ids(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        remote_ids: &[RemoteId],
    ) -> Result<Vec<Message>>;

    async fn get_by_criteria(&self, criteria: MessagesCriteria) -> Result<Vec<Message>>;

    async fn get_message_status(
        &self,
        account_id: AccountId,
        message_id: MessageId,
    ) -> Result<MessageStatus>;

    async fn change_message_status(
        &self,
        account_id: AccountId,
        message_id: MessageId,
        status: MessageStatus,
        remote_id: Option<RemoteId>,
        conversation_message_id: Option<CmId>,
    ) -> Result<()>;

    async fn change_messages_status(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
        status: MessageStatus,
    ) -> Result<()>;

    /// Oldest message in status `Queue` across the given accounts, ordered
    /// by local id (creation order).
    async fn find_first_unsent_message(
        &self,
        account_ids: &[AccountId],
    ) -> Result<Option<(AccountId, Message)>>;

    /// Most recent non-deleted, delivered message of a conversation.
    async fn find_last_sent_message_id_for_peer(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<Option<MessageId>>;

    /// Apply a patch batch as an all-or-nothing unit.  Patches targeting
    /// unknown rows are no-ops (an update touching zero rows is not an
    /// error).
    async fn apply_patches(&self, account_id: AccountId, patches: &[MessagePatch]) -> Result<()>;

    /// Resolve the forwarded subtree of a message to remote ids.
    async fn forward_info(
        &self,
        account_id: AccountId,
        message_id: MessageId,
        peer_id: PeerId,
    ) -> Result<ForwardInfo>;

    /// Inbound, non-deleted messages above the in-read marker.
    async fn count_unread(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        in_read: RemoteId,
    ) -> Result<u32>;
}
