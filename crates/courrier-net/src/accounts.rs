//! Account registry contract (settings collaborator).

use tokio::sync::broadcast;

use courrier_shared::ids::AccountId;

/// View over the application's registered accounts.
pub trait AccountsRegistry: Send + Sync {
    /// Accounts the send queue serves, in priority order.
    fn registered(&self) -> Vec<AccountId>;

    /// The account the UI currently acts as.
    fn current(&self) -> AccountId;

    /// Whether this account wants to drop to offline mode when the service
    /// reports its session/peer gone, instead of surfacing a send error.
    fn prefers_offline(&self, account_id: AccountId) -> bool;

    /// Registration changes, published after the fact (no replay).
    fn observe(&self) -> broadcast::Receiver<Vec<AccountId>>;
}
