//! Criteria objects for range queries.

use courrier_shared::ids::{AccountId, MessageId, PeerId};

/// Selects messages of one conversation, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesCriteria {
    pub account_id: AccountId,
    pub peer_id: PeerId,
    /// Only messages with a local id strictly below this one.
    pub below_id: Option<MessageId>,
    pub limit: Option<usize>,
    pub include_deleted: bool,
}

impl MessagesCriteria {
    pub fn new(account_id: AccountId, peer_id: PeerId) -> Self {
        Self {
            account_id,
            peer_id,
            below_id: None,
            limit: None,
            include_deleted: false,
        }
    }
}

/// Selects conversations of one account, most recent activity first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogsCriteria {
    pub account_id: AccountId,
    pub limit: Option<usize>,
}

impl DialogsCriteria {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            limit: None,
        }
    }
}
