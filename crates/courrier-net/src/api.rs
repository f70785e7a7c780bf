//! Remote API contracts.
//!
//! Implementations wrap the actual wire transport; every method is a
//! suspension point and returns typed [`NetError`](crate::NetError)s so the
//! engine can tell "gone" from "unreachable".

use async_trait::async_trait;

use courrier_shared::ids::{AccountId, PeerId, RemoteId};
use courrier_shared::owner::{Community, User};

use crate::dto::{
    AttachmentToken, ConversationsResponse, DeleteAck, DialogsResponse, HistoryResponse,
    MessageDto, SendMessageResponse, SendRequest,
};
use crate::error::Result;

#[async_trait]
pub trait RemoteMessagesApi: Send + Sync {
    async fn send(&self, account_id: AccountId, request: SendRequest)
        -> Result<SendMessageResponse>;

    async fn get_history(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        count: u32,
        offset: Option<u32>,
        start_message_id: Option<RemoteId>,
        rev: bool,
    ) -> Result<HistoryResponse>;

    async fn get_dialogs(
        &self,
        account_id: AccountId,
        count: u32,
        start_message_id: Option<RemoteId>,
    ) -> Result<DialogsResponse>;

    async fn get_conversations(
        &self,
        account_id: AccountId,
        peer_ids: &[PeerId],
    ) -> Result<ConversationsResponse>;

    async fn get_by_ids(&self, account_id: AccountId, ids: &[RemoteId])
        -> Result<Vec<MessageDto>>;

    async fn delete(
        &self,
        account_id: AccountId,
        ids: &[RemoteId],
        for_all: bool,
        spam: bool,
    ) -> Result<Vec<DeleteAck>>;

    async fn restore(&self, account_id: AccountId, message_id: RemoteId) -> Result<()>;

    /// Returns the ids the service acknowledged.
    async fn mark_important(
        &self,
        account_id: AccountId,
        ids: &[RemoteId],
        important: bool,
    ) -> Result<Vec<RemoteId>>;

    async fn mark_read(&self, account_id: AccountId, peer_id: PeerId, to_id: RemoteId)
        -> Result<()>;

    async fn pin(&self, account_id: AccountId, peer_id: PeerId, message_id: RemoteId)
        -> Result<()>;

    async fn unpin(&self, account_id: AccountId, peer_id: PeerId) -> Result<()>;

    async fn delete_dialog(&self, account_id: AccountId, peer_id: PeerId) -> Result<()>;

    async fn edit(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        message_id: RemoteId,
        text: Option<&str>,
        attachments: &[AttachmentToken],
        keep_forwards: bool,
    ) -> Result<()>;
}

#[async_trait]
pub trait RemoteOwnersApi: Send + Sync {
    /// Fetch users by positive id.
    async fn get_users(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<User>>;

    /// Fetch communities by positive id.
    async fn get_communities(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<Community>>;
}

#[async_trait]
pub trait RemoteAccountsApi: Send + Sync {
    /// Mark the account's session offline on the service.
    async fn set_offline(&self, account_id: AccountId) -> Result<()>;
}

#[async_trait]
pub trait RemoteMediaApi: Send + Sync {
    /// Upload a voice recording for a conversation and return its token.
    async fn upload_voice(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        path: &str,
    ) -> Result<AttachmentToken>;
}
