//! Owner resolution: numeric ids to user/community records.
//!
//! Ids partition by sign: positive ids are users, negative ids are
//! communities, zero stands for the current account.  Resolution composes a
//! local cache with the network under a tri-state freshness policy; the
//! cache check always completes before any network call begins.

use std::sync::Arc;

use tracing::debug;

use courrier_net::{AccountsRegistry, RemoteOwnersApi};
use courrier_shared::ids::{AccountId, PeerId};
use courrier_shared::owner::{Community, Owner, OwnersBundle, User};
use courrier_store::OwnersStore;

use crate::error::{EngineError, Result};

/// Freshness policy for owner resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local store only; the result may be partial.
    Cache,
    /// Always fetch from the network and overwrite the cache.
    Net,
    /// Serve from the local store; if anything is missing, fetch the whole
    /// batch from the network and write it through.
    Any,
}

pub struct OwnersResolver {
    store: Arc<dyn OwnersStore>,
    remote: Arc<dyn RemoteOwnersApi>,
    accounts: Arc<dyn AccountsRegistry>,
}

struct DividedIds {
    uids: Vec<i64>,
    gids: Vec<i64>,
}

impl DividedIds {
    fn new(ids: &[PeerId], current_account: AccountId) -> Self {
        let mut uids = Vec::new();
        let mut gids = Vec::new();
        for &id in ids {
            if id > 0 {
                uids.push(id);
            } else if id < 0 {
                gids.push(-id);
            } else {
                uids.push(current_account);
            }
        }
        Self { uids, gids }
    }
}

impl OwnersResolver {
    pub fn new(
        store: Arc<dyn OwnersStore>,
        remote: Arc<dyn RemoteOwnersApi>,
        accounts: Arc<dyn AccountsRegistry>,
    ) -> Self {
        Self {
            store,
            remote,
            accounts,
        }
    }

    /// Resolve `ids` into a request-scoped bundle.
    ///
    /// Owners in `already_known` satisfy their ids without touching the
    /// cache or the network; only the remaining ids go through `mode`.
    pub async fn resolve(
        &self,
        account_id: AccountId,
        ids: &[PeerId],
        mode: Mode,
        already_known: Vec<Owner>,
    ) -> Result<OwnersBundle> {
        let mut bundle = OwnersBundle::with_capacity(ids.len());
        bundle.put_all(already_known);
        if ids.is_empty() {
            return Ok(bundle);
        }

        let missing = bundle.missing(ids);
        if missing.is_empty() {
            return Ok(bundle);
        }
        debug!(
            requested = ids.len(),
            missing = missing.len(),
            ?mode,
            "resolving owners"
        );

        let divided = DividedIds::new(&missing, self.accounts.current());
        let users = self.get_users(account_id, &divided.uids, mode).await?;
        let communities = self
            .get_communities(account_id, &divided.gids, mode)
            .await?;

        bundle.put_all(users.into_iter().map(Owner::User));
        bundle.put_all(communities.into_iter().map(Owner::Community));
        Ok(bundle)
    }

    /// Resolve a single owner; absence is an error.
    pub async fn get_owner(
        &self,
        account_id: AccountId,
        owner_id: PeerId,
        mode: Mode,
    ) -> Result<Owner> {
        let owner_id = if owner_id == 0 {
            self.accounts.current()
        } else {
            owner_id
        };
        if owner_id > 0 {
            let users = self.get_users(account_id, &[owner_id], mode).await?;
            users
                .into_iter()
                .next()
                .map(Owner::User)
                .ok_or(EngineError::NotFound)
        } else {
            let communities = self.get_communities(account_id, &[-owner_id], mode).await?;
            communities
                .into_iter()
                .next()
                .map(Owner::Community)
                .ok_or(EngineError::NotFound)
        }
    }

    /// Refresh the cache for `ids` from the network unconditionally.
    pub async fn cache_actual_owners(&self, account_id: AccountId, ids: &[PeerId]) -> Result<()> {
        let divided = DividedIds::new(ids, self.accounts.current());
        if !divided.gids.is_empty() {
            self.fetch_communities_and_store(account_id, &divided.gids)
                .await?;
        }
        if !divided.uids.is_empty() {
            self.fetch_users_and_store(account_id, &divided.uids).await?;
        }
        Ok(())
    }

    async fn get_users(&self, account_id: AccountId, uids: &[i64], mode: Mode) -> Result<Vec<User>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        match mode {
            Mode::Cache => Ok(self.store.find_users(account_id, uids).await?),
            Mode::Net => self.fetch_users_and_store(account_id, uids).await,
            Mode::Any => {
                let cached = self.store.find_users(account_id, uids).await?;
                if cached.len() == uids.len() {
                    Ok(cached)
                } else {
                    // Fall back to the network for the whole batch, not just
                    // the missing ids, so the cache converges on one fetch.
                    self.fetch_users_and_store(account_id, uids).await
                }
            }
        }
    }

    async fn get_communities(
        &self,
        account_id: AccountId,
        gids: &[i64],
        mode: Mode,
    ) -> Result<Vec<Community>> {
        if gids.is_empty() {
            return Ok(Vec::new());
        }
        match mode {
            Mode::Cache => Ok(self.store.find_communities(account_id, gids).await?),
            Mode::Net => self.fetch_communities_and_store(account_id, gids).await,
            Mode::Any => {
                let cached = self.store.find_communities(account_id, gids).await?;
                if cached.len() == gids.len() {
                    Ok(cached)
                } else {
                    self.fetch_communities_and_store(account_id, gids).await
                }
            }
        }
    }

    async fn fetch_users_and_store(
        &self,
        account_id: AccountId,
        uids: &[i64],
    ) -> Result<Vec<User>> {
        let users = self.remote.get_users(account_id, uids).await?;
        self.store.store_users(account_id, users.clone()).await?;
        Ok(users)
    }

    async fn fetch_communities_and_store(
        &self,
        account_id: AccountId,
        gids: &[i64],
    ) -> Result<Vec<Community>> {
        let communities = self.remote.get_communities(account_id, gids).await?;
        self.store
            .store_communities(account_id, communities.clone())
            .await?;
        Ok(communities)
    }
}
