//! Shared test doubles for the engine integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use courrier_engine::{MessagesEngine, Remote, Stores};
use courrier_net::dto::{
    AttachmentToken, ConversationsResponse, DeleteAck, DialogsResponse, HistoryResponse,
    MessageDto, SendMessageResponse, SendRequest,
};
use courrier_net::{
    AccountsRegistry, NetError, RemoteAccountsApi, RemoteMediaApi, RemoteMessagesApi,
    RemoteOwnersApi, Upload, UploadDestination, UploadManager, UploadResult,
};
use courrier_shared::ids::{AccountId, PeerId, RemoteId};
use courrier_shared::owner::{Community, User};
use courrier_store::MemoryStore;

// ---------------------------------------------------------------------------
// Remote messages API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockMessagesApi {
    /// Pre-programmed send outcomes, consumed in order; when empty, sends
    /// succeed with generated ids.
    pub send_results: Mutex<VecDeque<Result<SendMessageResponse, NetError>>>,
    pub sent_requests: Mutex<Vec<SendRequest>>,
    pub history: Mutex<Option<HistoryResponse>>,
    pub dialogs: Mutex<Option<DialogsResponse>>,
    pub conversations: Mutex<Option<ConversationsResponse>>,
    next_remote_id: AtomicI32,
}

impl MockMessagesApi {
    pub fn new() -> Self {
        Self {
            next_remote_id: AtomicI32::new(1000),
            ..Default::default()
        }
    }

    pub fn push_send_result(&self, result: Result<SendMessageResponse, NetError>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteMessagesApi for MockMessagesApi {
    async fn send(
        &self,
        _account_id: AccountId,
        request: SendRequest,
    ) -> Result<SendMessageResponse, NetError> {
        let programmed = self.send_results.lock().unwrap().pop_front();
        let result = match programmed {
            Some(result) => result,
            None => {
                let id = self.next_remote_id.fetch_add(1, Ordering::SeqCst);
                Ok(SendMessageResponse {
                    message_id: id,
                    conversation_message_id: id,
                })
            }
        };
        if result.is_ok() {
            self.sent_requests.lock().unwrap().push(request);
        }
        result
    }

    async fn get_history(
        &self,
        _account_id: AccountId,
        _peer_id: PeerId,
        _count: u32,
        _offset: Option<u32>,
        _start_message_id: Option<RemoteId>,
        _rev: bool,
    ) -> Result<HistoryResponse, NetError> {
        self.history
            .lock()
            .unwrap()
            .clone()
            .ok_or(NetError::NotFound)
    }

    async fn get_dialogs(
        &self,
        _account_id: AccountId,
        _count: u32,
        _start_message_id: Option<RemoteId>,
    ) -> Result<DialogsResponse, NetError> {
        self.dialogs
            .lock()
            .unwrap()
            .clone()
            .ok_or(NetError::NotFound)
    }

    async fn get_conversations(
        &self,
        _account_id: AccountId,
        _peer_ids: &[PeerId],
    ) -> Result<ConversationsResponse, NetError> {
        self.conversations
            .lock()
            .unwrap()
            .clone()
            .ok_or(NetError::NotFound)
    }

    async fn get_by_ids(
        &self,
        _account_id: AccountId,
        _ids: &[RemoteId],
    ) -> Result<Vec<MessageDto>, NetError> {
        Ok(Vec::new())
    }

    async fn delete(
        &self,
        _account_id: AccountId,
        ids: &[RemoteId],
        _for_all: bool,
        _spam: bool,
    ) -> Result<Vec<DeleteAck>, NetError> {
        Ok(ids
            .iter()
            .map(|id| DeleteAck {
                message_id: *id,
                ok: true,
            })
            .collect())
    }

    async fn restore(&self, _account_id: AccountId, _message_id: RemoteId) -> Result<(), NetError> {
        Ok(())
    }

    async fn mark_important(
        &self,
        _account_id: AccountId,
        ids: &[RemoteId],
        _important: bool,
    ) -> Result<Vec<RemoteId>, NetError> {
        Ok(ids.to_vec())
    }

    async fn mark_read(
        &self,
        _account_id: AccountId,
        _peer_id: PeerId,
        _to_id: RemoteId,
    ) -> Result<(), NetError> {
        Ok(())
    }

    async fn pin(
        &self,
        _account_id: AccountId,
        _peer_id: PeerId,
        _message_id: RemoteId,
    ) -> Result<(), NetError> {
        Ok(())
    }

    async fn unpin(&self, _account_id: AccountId, _peer_id: PeerId) -> Result<(), NetError> {
        Ok(())
    }

    async fn delete_dialog(&self, _account_id: AccountId, _peer_id: PeerId) -> Result<(), NetError> {
        Ok(())
    }

    async fn edit(
        &self,
        _account_id: AccountId,
        _peer_id: PeerId,
        _message_id: RemoteId,
        _text: Option<&str>,
        _attachments: &[AttachmentToken],
        _keep_forwards: bool,
    ) -> Result<(), NetError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote owners API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockOwnersApi {
    pub users: Mutex<Vec<User>>,
    pub communities: Mutex<Vec<Community>>,
    pub user_calls: Mutex<Vec<Vec<i64>>>,
    pub community_calls: Mutex<Vec<Vec<i64>>>,
    pub fail: Mutex<bool>,
}

impl MockOwnersApi {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RemoteOwnersApi for MockOwnersApi {
    async fn get_users(&self, _account_id: AccountId, ids: &[i64]) -> Result<Vec<User>, NetError> {
        if *self.fail.lock().unwrap() {
            return Err(NetError::Transport("offline".into()));
        }
        self.user_calls.lock().unwrap().push(ids.to_vec());
        let known = self.users.lock().unwrap();
        Ok(known
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn get_communities(
        &self,
        _account_id: AccountId,
        ids: &[i64],
    ) -> Result<Vec<Community>, NetError> {
        if *self.fail.lock().unwrap() {
            return Err(NetError::Transport("offline".into()));
        }
        self.community_calls.lock().unwrap().push(ids.to_vec());
        let known = self.communities.lock().unwrap();
        Ok(known
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Remote accounts / media APIs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockAccountsApi {
    pub offline_calls: Mutex<Vec<AccountId>>,
}

#[async_trait]
impl RemoteAccountsApi for MockAccountsApi {
    async fn set_offline(&self, account_id: AccountId) -> Result<(), NetError> {
        self.offline_calls.lock().unwrap().push(account_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockMediaApi {
    pub voice_uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl RemoteMediaApi for MockMediaApi {
    async fn upload_voice(
        &self,
        _account_id: AccountId,
        peer_id: PeerId,
        path: &str,
    ) -> Result<AttachmentToken, NetError> {
        self.voice_uploads.lock().unwrap().push(path.to_string());
        Ok(AttachmentToken::AudioMessage {
            id: 9000,
            owner_id: peer_id,
            access_key: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Upload manager
// ---------------------------------------------------------------------------

pub struct MockUploadManager {
    pub pending: Mutex<Vec<Upload>>,
    pub results_tx: broadcast::Sender<UploadResult>,
}

impl Default for MockUploadManager {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            results_tx: broadcast::channel(16).0,
        }
    }
}

impl MockUploadManager {
    pub fn complete(&self, upload: Upload, success: bool) {
        let _ = self.results_tx.send(UploadResult { upload, success });
    }
}

#[async_trait]
impl UploadManager for MockUploadManager {
    fn observe_results(&self) -> broadcast::Receiver<UploadResult> {
        self.results_tx.subscribe()
    }

    async fn get_pending(
        &self,
        account_id: AccountId,
        destination: &UploadDestination,
    ) -> Vec<Upload> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.account_id == account_id && u.destination == *destination)
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Accounts registry
// ---------------------------------------------------------------------------

pub struct MockRegistry {
    pub accounts: Vec<AccountId>,
    pub current: AccountId,
    pub prefers_offline: bool,
    pub tx: broadcast::Sender<Vec<AccountId>>,
}

impl MockRegistry {
    pub fn new(accounts: Vec<AccountId>) -> Self {
        let current = accounts.first().copied().unwrap_or(0);
        Self {
            accounts,
            current,
            prefers_offline: false,
            tx: broadcast::channel(16).0,
        }
    }
}

impl AccountsRegistry for MockRegistry {
    fn registered(&self) -> Vec<AccountId> {
        self.accounts.clone()
    }

    fn current(&self) -> AccountId {
        self.current
    }

    fn prefers_offline(&self, _account_id: AccountId) -> bool {
        self.prefers_offline
    }

    fn observe(&self) -> broadcast::Receiver<Vec<AccountId>> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: MessagesEngine,
    pub store: Arc<MemoryStore>,
    pub messages_api: Arc<MockMessagesApi>,
    pub owners_api: Arc<MockOwnersApi>,
    pub accounts_api: Arc<MockAccountsApi>,
    pub media_api: Arc<MockMediaApi>,
    pub uploads: Arc<MockUploadManager>,
}

impl Harness {
    pub fn new(accounts: Vec<AccountId>) -> Self {
        Self::with_registry(MockRegistry::new(accounts))
    }

    pub fn with_registry(registry: MockRegistry) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let store = Arc::new(MemoryStore::new());
        let messages_api = Arc::new(MockMessagesApi::new());
        let owners_api = Arc::new(MockOwnersApi::default());
        let accounts_api = Arc::new(MockAccountsApi::default());
        let media_api = Arc::new(MockMediaApi::default());
        let uploads = Arc::new(MockUploadManager::default());

        let engine = MessagesEngine::new(
            Stores::from_memory(store.clone()),
            Remote {
                messages: messages_api.clone(),
                owners: owners_api.clone(),
                accounts: accounts_api.clone(),
                media: media_api.clone(),
            },
            uploads.clone(),
            Arc::new(registry),
        );
        Self {
            engine,
            store,
            messages_api,
            owners_api,
            accounts_api,
            media_api,
            uploads,
        }
    }
}
