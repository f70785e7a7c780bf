//! Session key store contract.

use async_trait::async_trait;

use courrier_shared::crypt::{KeyLocationPolicy, SessionKeyPair};
use courrier_shared::ids::{AccountId, PeerId, SessionId};

use crate::error::Result;

/// Key pairs are addressed by `(account, session id)` within one key
/// location policy; `Persist` and `Ram` keys live in separate namespaces.
#[async_trait]
pub trait KeysStore: Send + Sync {
    /// Save a freshly negotiated pair.  Saving a session id twice within the
    /// same policy is a conflict.
    async fn save_key_pair(&self, policy: KeyLocationPolicy, pair: SessionKeyPair) -> Result<()>;

    async fn find_key_pair(
        &self,
        policy: KeyLocationPolicy,
        account_id: AccountId,
        session_id: SessionId,
    ) -> Result<Option<SessionKeyPair>>;

    /// Most recently saved pair for a conversation, if any.
    async fn find_last_key_pair(
        &self,
        policy: KeyLocationPolicy,
        account_id: AccountId,
        peer_id: PeerId,
    ) -> Result<Option<SessionKeyPair>>;
}
