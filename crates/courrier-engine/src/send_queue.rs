//! The serialized send loop.
//!
//! One dedicated worker drains the queue: oldest queued message first,
//! strictly one delivery in flight, self-rescheduling after success and
//! stopping after failure until the next explicit wake.  Wake signals that
//! arrive while a drain is running are coalesced away; they would find the
//! queue already being served.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use courrier_net::dto::{token_for, SendMessageResponse, SendRequest};
use courrier_net::{NetError, Upload, UploadResult};
use courrier_shared::attachment::Attachment;
use courrier_shared::ids::{AccountId, RemoteId};
use courrier_shared::message::{Message, MessageStatus};
use courrier_shared::patch::PeerPatch;
use courrier_shared::update::{SendErrorEvent, SentMsg};

use crate::engine::EngineInner;
use crate::error::{EngineError, Result};

enum SendOutcome {
    /// A message went out; keep draining.
    Sent,
    /// Nothing left in the queue.
    Idle,
    /// The attempt failed; wait for the next explicit wake.
    Failed,
}

pub(crate) fn spawn_send_worker(
    inner: Arc<EngineInner>,
    mut wake_rx: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while wake_rx.recv().await.is_some() {
            loop {
                match send_next(&inner).await {
                    SendOutcome::Sent => continue,
                    SendOutcome::Idle | SendOutcome::Failed => break,
                }
            }
            // Coalesce wakes that arrived during the drain; the queue state
            // they announced has already been served (or just failed).
            while wake_rx.try_recv().is_ok() {}
        }
    })
}

/// One delivery attempt: pick the oldest queued message, move it through
/// `Sending`, and fold the outcome back through the patch path.
async fn send_next(inner: &EngineInner) -> SendOutcome {
    let accounts = inner.registered_accounts();
    if accounts.is_empty() {
        return SendOutcome::Idle;
    }

    let found = match inner.stores.messages.find_first_unsent_message(&accounts).await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "queue scan failed");
            return SendOutcome::Idle;
        }
    };
    let Some((account_id, entity)) = found else {
        debug!("sending queue drained");
        return SendOutcome::Idle;
    };

    if let Err(e) = inner
        .change_message_status(account_id, entity.id, MessageStatus::Sending, None, None)
        .await
    {
        warn!(message_id = entity.id, error = %e, "could not mark message as sending");
        return SendOutcome::Failed;
    }

    match internal_send(inner, account_id, &entity).await {
        Ok(response) => {
            if let Err(e) = inner
                .change_message_status(
                    account_id,
                    entity.id,
                    MessageStatus::Sent,
                    Some(response.message_id),
                    Some(response.conversation_message_id),
                )
                .await
            {
                warn!(message_id = entity.id, error = %e, "could not finalize sent message");
            }
            let patch = PeerPatch::new(entity.peer_id)
                .with_last_message(entity.id)
                .with_unread_count(0);
            if let Err(e) = inner.apply_peer_patches(account_id, &[patch]).await {
                warn!(peer_id = entity.peer_id, error = %e, "could not advance peer state");
            }
            inner.bus.publish_sent_message(SentMsg {
                message_id: entity.id,
                remote_id: response.message_id,
                peer_id: entity.peer_id,
                conversation_message_id: response.conversation_message_id,
                account_id,
            });
            SendOutcome::Sent
        }
        Err(error) => {
            let _ = inner
                .change_message_status(account_id, entity.id, MessageStatus::Error, None, None)
                .await;
            if matches!(error, EngineError::Net(NetError::NotFound)) {
                // The service says the peer/account is gone.  Request offline
                // mode instead of surfacing a user-visible error.  Only this
                // failure takes the suppressed path.
                let current = inner.accounts.current();
                if inner.accounts.prefers_offline(current) {
                    if let Err(e) = inner.remote.accounts.set_offline(current).await {
                        debug!(error = %e, "offline request failed");
                    }
                }
                debug!(message_id = entity.id, "send target gone, error suppressed");
            } else {
                inner.bus.publish_send_error(SendErrorEvent {
                    account_id,
                    message_id: entity.id,
                    peer_id: entity.peer_id,
                    reason: error.to_string(),
                });
            }
            SendOutcome::Failed
        }
    }
}

/// Build the wire request for one message and invoke the remote send.
async fn internal_send(
    inner: &EngineInner,
    account_id: AccountId,
    entity: &Message,
) -> Result<SendMessageResponse> {
    let mut request = SendRequest::new(entity.id, entity.peer_id);
    request.payload = entity.payload.clone();

    // Plain text fast path.
    if entity.voice_file.is_none() && entity.attachments.is_empty() && entity.forward_count == 0 {
        request.text = entity.text.clone();
        return Ok(inner.remote.messages.send(account_id, request).await?);
    }

    // A sticker is sent by id, alone.
    let sticker_id = entity.attachments.iter().find_map(|a| match a {
        Attachment::Sticker(s) => Some(s.id),
        _ => None,
    });
    if let Some(sticker_id) = sticker_id {
        let (reply_to, _) = resolve_forwards(inner, account_id, entity).await?;
        request.sticker_id = Some(sticker_id);
        request.reply_to = reply_to;
        return Ok(inner.remote.messages.send(account_id, request).await?);
    }

    let mut tokens = Vec::with_capacity(entity.attachments.len() + 1);
    for attachment in &entity.attachments {
        if let Some(token) = token_for(attachment) {
            tokens.push(token);
        }
    }
    if let Some(path) = &entity.voice_file {
        // The recording has to be hosted before the send can reference it.
        let token = inner
            .remote
            .media
            .upload_voice(account_id, entity.peer_id, path)
            .await?;
        tokens.push(token);
    }

    let (reply_to, forward_ids) = resolve_forwards(inner, account_id, entity).await?;
    request.text = entity.text.clone();
    request.attachments = tokens;
    request.reply_to = reply_to;
    request.forward_ids = forward_ids;
    Ok(inner.remote.messages.send(account_id, request).await?)
}

/// Resolve the forwarded subtree to remote ids.  Forwards that are still
/// local-only fail the delivery with a distinct error; the user re-enqueues
/// once they have been delivered.
async fn resolve_forwards(
    inner: &EngineInner,
    account_id: AccountId,
    entity: &Message,
) -> Result<(Option<RemoteId>, Vec<RemoteId>)> {
    if entity.forward_count == 0 {
        return Ok((None, Vec::new()));
    }
    let info = inner
        .stores
        .messages
        .forward_info(account_id, entity.id, entity.peer_id)
        .await?;
    if info.unresolved > 0 {
        return Err(EngineError::UnresolvedForward);
    }
    Ok((info.reply_to, info.message_ids))
}

// ---------------------------------------------------------------------------
// Upload completion listener
// ---------------------------------------------------------------------------

pub(crate) fn spawn_upload_listener(inner: Arc<EngineInner>) -> JoinHandle<()> {
    let mut rx = inner.uploads.observe_results();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(UploadResult { upload, success }) => {
                    if success {
                        on_upload_success(&inner, upload).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "upload result stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Move a parked message back into the queue once its last upload is done.
/// The status re-check makes duplicate completion signals harmless.
async fn on_upload_success(inner: &EngineInner, upload: Upload) {
    let Some(message_id) = upload.destination.message_id() else {
        return;
    };
    let account_id = upload.account_id;

    let pending = inner.uploads.get_pending(account_id, &upload.destination).await;
    if !pending.is_empty() {
        return;
    }
    let status = match inner
        .stores
        .messages
        .get_message_status(account_id, message_id)
        .await
    {
        Ok(status) => status,
        Err(_) => return,
    };
    if status != MessageStatus::WaitingForUpload {
        return;
    }
    if inner
        .change_message_status(account_id, message_id, MessageStatus::Queue, None, None)
        .await
        .is_ok()
    {
        let _ = inner.wake_tx.try_send(());
    }
}
