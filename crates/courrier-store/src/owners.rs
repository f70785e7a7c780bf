//! Owner cache contract.
//!
//! Users and communities are cached by their positive id; the sign-based
//! partitioning happens in the resolver, not here.

use async_trait::async_trait;

use courrier_shared::ids::AccountId;
use courrier_shared::owner::{Community, User};

use crate::error::Result;

#[async_trait]
pub trait OwnersStore: Send + Sync {
    /// Cached users among `ids`; missing ids are absent from the result.
    async fn find_users(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<User>>;

    async fn find_communities(&self, account_id: AccountId, ids: &[i64]) -> Result<Vec<Community>>;

    async fn store_users(&self, account_id: AccountId, users: Vec<User>) -> Result<()>;

    async fn store_communities(
        &self,
        account_id: AccountId,
        communities: Vec<Community>,
    ) -> Result<()>;
}
