//! Engine facade and collaborator wiring.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use courrier_net::dto::MessageDto;
use courrier_net::push::{
    BadgeCountUpdate, FlagsResetUpdate, FlagsSetUpdate, InputReadUpdate, OutputReadUpdate,
    ReactionChangeUpdate, WriteTextUpdate,
};
use courrier_net::{
    AccountsRegistry, RemoteAccountsApi, RemoteMediaApi, RemoteMessagesApi, RemoteOwnersApi,
    UploadManager,
};
use courrier_shared::attachment::Attachment;
use courrier_shared::ids::{AccountId, MessageId, PeerId, RemoteId};
use courrier_shared::message::Message;
use courrier_shared::patch::{MessagePatch, PeerPatch};
use courrier_shared::peer::Keyboard;
use courrier_shared::update::{
    MessageUpdate, PeerDeleting, PeerUpdate, SendErrorEvent, SentMsg, WriteText,
};
use courrier_store::{KeysStore, MemoryStore, MessagesStore, OwnersStore, PeersStore};

use crate::compose::MessageBuilder;
use crate::decryptor::MessagesDecryptor;
use crate::error::Result;
use crate::events::EventBus;
use crate::history::{Conversation, Dialog, MessagesPage};
use crate::owners::{Mode, OwnersResolver};
use crate::send_queue;

/// Store collaborators, one handle per concern.
#[derive(Clone)]
pub struct Stores {
    pub messages: Arc<dyn MessagesStore>,
    pub peers: Arc<dyn PeersStore>,
    pub owners: Arc<dyn OwnersStore>,
    pub keys: Arc<dyn KeysStore>,
}

impl Stores {
    /// All four concerns backed by one in-memory store.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            messages: store.clone(),
            peers: store.clone(),
            owners: store.clone(),
            keys: store,
        }
    }
}

/// Remote-service collaborators.
#[derive(Clone)]
pub struct Remote {
    pub messages: Arc<dyn RemoteMessagesApi>,
    pub owners: Arc<dyn RemoteOwnersApi>,
    pub accounts: Arc<dyn RemoteAccountsApi>,
    pub media: Arc<dyn RemoteMediaApi>,
}

pub(crate) struct EngineInner {
    pub(crate) stores: Stores,
    pub(crate) remote: Remote,
    pub(crate) uploads: Arc<dyn UploadManager>,
    pub(crate) accounts: Arc<dyn AccountsRegistry>,
    pub(crate) bus: EventBus,
    pub(crate) decryptor: MessagesDecryptor,
    pub(crate) resolver: OwnersResolver,
    pub(crate) wake_tx: mpsc::Sender<()>,
    pub(crate) registered: Mutex<Option<Vec<AccountId>>>,
}

impl EngineInner {
    pub(crate) fn registered_accounts(&self) -> Vec<AccountId> {
        let mut guard = self.registered.lock().unwrap();
        guard
            .get_or_insert_with(|| self.accounts.registered())
            .clone()
    }
}

/// The message synchronization and delivery engine.
///
/// Owns the send worker and the background listeners (upload completions,
/// account-list changes) as a composite handle; dropping the engine tears
/// them down as a unit.
pub struct MessagesEngine {
    inner: Arc<EngineInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MessagesEngine {
    pub fn new(
        stores: Stores,
        remote: Remote,
        uploads: Arc<dyn UploadManager>,
        accounts: Arc<dyn AccountsRegistry>,
    ) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(8);
        let decryptor = MessagesDecryptor::new(stores.keys.clone());
        let resolver = OwnersResolver::new(
            stores.owners.clone(),
            remote.owners.clone(),
            accounts.clone(),
        );
        let inner = Arc::new(EngineInner {
            stores,
            remote,
            uploads,
            accounts,
            bus: EventBus::new(),
            decryptor,
            resolver,
            wake_tx,
            registered: Mutex::new(None),
        });

        let tasks = vec![
            send_queue::spawn_send_worker(inner.clone(), wake_rx),
            send_queue::spawn_upload_listener(inner.clone()),
            spawn_accounts_listener(inner.clone()),
        ];
        info!("messages engine started");
        Self {
            inner,
            tasks: Mutex::new(tasks),
        }
    }

    // -- Send queue ---------------------------------------------------------

    /// Signal the send loop to wake.  Duplicate signals coalesce; waking an
    /// already-draining loop is a no-op.
    pub fn run_sending_queue(&self) {
        let _ = self.inner.wake_tx.try_send(());
    }

    /// Create or update an outbound message and stage it for delivery.
    pub async fn save_message(&self, builder: MessageBuilder) -> Result<Message> {
        self.inner.save_message(builder).await
    }

    /// Put a failed message back into the queue.
    pub async fn enqueue_again(&self, account_id: AccountId, message_id: MessageId) -> Result<()> {
        self.inner.enqueue_again(account_id, message_id).await
    }

    pub async fn enqueue_again_list(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<()> {
        self.inner.enqueue_again_list(account_id, ids).await
    }

    // -- Reconciliation -----------------------------------------------------

    pub async fn apply_message_patches(
        &self,
        account_id: AccountId,
        patches: &[MessagePatch],
    ) -> Result<()> {
        self.inner.apply_message_patches(account_id, patches).await
    }

    pub async fn apply_peer_patches(
        &self,
        account_id: AccountId,
        patches: &[PeerPatch],
    ) -> Result<()> {
        self.inner.apply_peer_patches(account_id, patches).await
    }

    /// Persist pushed messages and recompute the affected peer aggregates.
    pub async fn insert_messages(
        &self,
        account_id: AccountId,
        messages: Vec<MessageDto>,
    ) -> Result<()> {
        self.inner.insert_messages(account_id, messages).await
    }

    pub async fn handle_flags_updates(
        &self,
        account_id: AccountId,
        set_updates: Vec<FlagsSetUpdate>,
        reset_updates: Vec<FlagsResetUpdate>,
    ) -> Result<()> {
        self.inner
            .handle_flags_updates(account_id, set_updates, reset_updates)
            .await
    }

    pub async fn handle_read_updates(
        &self,
        account_id: AccountId,
        out_updates: Vec<OutputReadUpdate>,
        in_updates: Vec<InputReadUpdate>,
    ) -> Result<()> {
        self.inner
            .handle_read_updates(account_id, out_updates, in_updates)
            .await
    }

    pub async fn handle_reaction_updates(
        &self,
        account_id: AccountId,
        updates: Vec<ReactionChangeUpdate>,
    ) -> Result<()> {
        self.inner.handle_reaction_updates(account_id, updates).await
    }

    pub fn handle_write_updates(&self, account_id: AccountId, updates: Vec<WriteTextUpdate>) {
        self.inner.handle_write_updates(account_id, updates)
    }

    pub async fn handle_badge_updates(
        &self,
        account_id: AccountId,
        updates: Vec<BadgeCountUpdate>,
    ) -> Result<()> {
        self.inner.handle_badge_updates(account_id, updates).await
    }

    // -- Read paths ---------------------------------------------------------

    pub async fn get_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        count: u32,
        offset: Option<u32>,
        start_message_id: Option<RemoteId>,
        cache_data: bool,
        rev: bool,
    ) -> Result<MessagesPage> {
        self.inner
            .get_peer_messages(
                account_id,
                peer_id,
                count,
                offset,
                start_message_id,
                cache_data,
                rev,
            )
            .await
    }

    pub async fn get_cached_peer_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<MessagesPage> {
        self.inner.get_cached_peer_messages(account_id, peer_id).await
    }

    pub async fn find_cached_messages(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<MessagesPage> {
        self.inner.find_cached_messages(account_id, ids).await
    }

    pub async fn get_dialogs(
        &self,
        account_id: AccountId,
        count: u32,
        start_message_id: Option<RemoteId>,
    ) -> Result<Vec<Dialog>> {
        self.inner
            .get_dialogs(account_id, count, start_message_id)
            .await
    }

    pub async fn get_cached_dialogs(&self, account_id: AccountId) -> Result<Vec<Dialog>> {
        self.inner.get_cached_dialogs(account_id).await
    }

    pub async fn get_conversation(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        mode: Mode,
    ) -> Result<Conversation> {
        self.inner.get_conversation(account_id, peer_id, mode).await
    }

    // -- Mutations ----------------------------------------------------------

    pub async fn delete_messages(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        ids: &[MessageId],
        for_all: bool,
        spam: bool,
    ) -> Result<()> {
        self.inner
            .delete_messages(account_id, peer_id, ids, for_all, spam)
            .await
    }

    pub async fn restore_message(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        message_id: MessageId,
    ) -> Result<()> {
        self.inner
            .restore_message(account_id, peer_id, message_id)
            .await
    }

    pub async fn mark_as_important(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        ids: &[MessageId],
        important: bool,
    ) -> Result<()> {
        self.inner
            .mark_as_important(account_id, peer_id, ids, important)
            .await
    }

    pub async fn mark_as_read(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        to_id: RemoteId,
    ) -> Result<()> {
        self.inner.mark_as_read(account_id, peer_id, to_id).await
    }

    /// Pin a delivered message, or unpin with `None`.
    pub async fn pin_message(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        message: Option<Message>,
    ) -> Result<()> {
        self.inner.pin_message(account_id, peer_id, message).await
    }

    pub async fn delete_dialog(&self, account_id: AccountId, peer_id: PeerId) -> Result<()> {
        self.inner.delete_dialog(account_id, peer_id).await
    }

    pub async fn edit_message(
        &self,
        account_id: AccountId,
        message: &Message,
        text: Option<&str>,
        attachments: &[Attachment],
        keep_forwards: bool,
    ) -> Result<Message> {
        self.inner
            .edit_message(account_id, message, text, attachments, keep_forwards)
            .await
    }

    pub async fn update_dialog_keyboard(
        &self,
        account_id: AccountId,
        peer_id: PeerId,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.inner
            .update_dialog_keyboard(account_id, peer_id, keyboard)
            .await
    }

    // -- Crypto / owners ----------------------------------------------------

    pub async fn decrypt_messages(
        &self,
        account_id: AccountId,
        messages: Vec<Message>,
    ) -> Vec<Message> {
        self.inner.decryptor.decrypt_messages(account_id, messages).await
    }

    pub fn owners(&self) -> &OwnersResolver {
        &self.inner.resolver
    }

    // -- Observation --------------------------------------------------------

    pub fn observe_peer_updates(&self) -> broadcast::Receiver<Vec<PeerUpdate>> {
        self.inner.bus.subscribe_peer_updates()
    }

    pub fn observe_peer_deleting(&self) -> broadcast::Receiver<PeerDeleting> {
        self.inner.bus.subscribe_peer_deleting()
    }

    pub fn observe_message_updates(&self) -> broadcast::Receiver<Vec<MessageUpdate>> {
        self.inner.bus.subscribe_message_updates()
    }

    pub fn observe_text_write(&self) -> broadcast::Receiver<Vec<WriteText>> {
        self.inner.bus.subscribe_write_text()
    }

    pub fn observe_sent_messages(&self) -> broadcast::Receiver<SentMsg> {
        self.inner.bus.subscribe_sent_messages()
    }

    pub fn observe_send_errors(&self) -> broadcast::Receiver<SendErrorEvent> {
        self.inner.bus.subscribe_send_errors()
    }

    /// Tear down the send worker and background listeners as a unit.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

impl Drop for MessagesEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_accounts_listener(inner: Arc<EngineInner>) -> JoinHandle<()> {
    let mut rx = inner.accounts.observe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(accounts) => {
                    *inner.registered.lock().unwrap() = Some(accounts);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Drop the stale cache; the next send re-reads the registry.
                    *inner.registered.lock().unwrap() = None;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
