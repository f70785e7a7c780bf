//! Upload-manager contract.
//!
//! The upload manager itself (progress, retries, the media endpoints) is an
//! external collaborator; the engine only needs to know which uploads are
//! still pending for a message and to hear about completed ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use courrier_shared::ids::{AccountId, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// Attachment destined for a message.
    Message,
}

/// Where an upload's result will be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadDestination {
    pub id: i64,
    pub kind: UploadKind,
}

impl UploadDestination {
    pub fn for_message(message_id: MessageId) -> Self {
        Self {
            id: message_id as i64,
            kind: UploadKind::Message,
        }
    }

    pub fn message_id(&self) -> Option<MessageId> {
        match self.kind {
            UploadKind::Message => Some(self.id as MessageId),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Error,
    Cancelling,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Upload {
    pub id: i64,
    pub account_id: AccountId,
    pub destination: UploadDestination,
    pub status: UploadStatus,
}

/// A finished upload, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResult {
    pub upload: Upload,
    pub success: bool,
}

#[async_trait]
pub trait UploadManager: Send + Sync {
    /// Completed uploads, published after the fact (no replay).
    fn observe_results(&self) -> broadcast::Receiver<UploadResult>;

    /// Uploads still pending for a destination.
    async fn get_pending(
        &self,
        account_id: AccountId,
        destination: &UploadDestination,
    ) -> Vec<Upload>;
}
