//! Owner resolution cache policies.

mod support;

use std::sync::Arc;

use courrier_engine::{Mode, OwnersResolver};
use courrier_shared::owner::{Community, Owner, User};
use courrier_store::{MemoryStore, OwnersStore};

use support::{MockOwnersApi, MockRegistry};

fn resolver(
    store: Arc<MemoryStore>,
    api: Arc<MockOwnersApi>,
) -> OwnersResolver {
    OwnersResolver::new(store, api, Arc::new(MockRegistry::new(vec![99])))
}

#[tokio::test]
async fn any_mode_falls_back_to_the_network_for_the_whole_batch() {
    let store = Arc::new(MemoryStore::new());
    store
        .store_users(1, vec![User::new(1, "A", "One"), User::new(2, "B", "Two")])
        .await
        .unwrap();
    let api = Arc::new(MockOwnersApi::with_users(vec![
        User::new(1, "A", "One"),
        User::new(2, "B", "Two"),
        User::new(3, "C", "Three"),
    ]));
    let resolver = resolver(store.clone(), api.clone());

    let bundle = resolver
        .resolve(1, &[1, 2, 3], Mode::Any, Vec::new())
        .await
        .unwrap();
    assert_eq!(bundle.len(), 3);

    // Exactly one network call, requesting all three ids.
    let calls = api.user_calls.lock().unwrap();
    assert_eq!(*calls, vec![vec![1, 2, 3]]);
    drop(calls);

    // And the cache is fully populated afterwards.
    assert_eq!(store.find_users(1, &[1, 2, 3]).await.unwrap().len(), 3);
}

#[tokio::test]
async fn any_mode_serves_a_full_cache_without_the_network() {
    let store = Arc::new(MemoryStore::new());
    store
        .store_users(1, vec![User::new(1, "A", "One")])
        .await
        .unwrap();
    let api = Arc::new(MockOwnersApi::default());
    let resolver = resolver(store, api.clone());

    let bundle = resolver.resolve(1, &[1], Mode::Any, Vec::new()).await.unwrap();
    assert_eq!(bundle.len(), 1);
    assert!(api.user_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn already_known_owners_skip_cache_and_network() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockOwnersApi::default());
    let resolver = resolver(store, api.clone());

    let known = vec![
        Owner::User(User::new(5, "E", "Known")),
        Owner::Community(Community::new(7, "Le Groupe")),
    ];
    let bundle = resolver.resolve(1, &[5, -7], Mode::Net, known).await.unwrap();
    assert_eq!(bundle.len(), 2);
    assert!(api.user_calls.lock().unwrap().is_empty());
    assert!(api.community_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cache_mode_may_return_a_partial_bundle() {
    let store = Arc::new(MemoryStore::new());
    store
        .store_users(1, vec![User::new(1, "A", "One")])
        .await
        .unwrap();
    let api = Arc::new(MockOwnersApi::default());
    let resolver = resolver(store, api.clone());

    let bundle = resolver
        .resolve(1, &[1, 2], Mode::Cache, Vec::new())
        .await
        .unwrap();
    assert_eq!(bundle.len(), 1);
    assert!(bundle.get(1).is_some());
    assert!(bundle.get(2).is_none());
    assert!(api.user_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn network_failure_propagates_on_fallback() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockOwnersApi::default());
    *api.fail.lock().unwrap() = true;
    let resolver = resolver(store, api);

    let result = resolver.resolve(1, &[4], Mode::Any, Vec::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn single_owner_lookup_and_not_found() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockOwnersApi::with_users(vec![User::new(3, "T", "Rois")]));
    let resolver = resolver(store, api);

    let owner = resolver.get_owner(1, 3, Mode::Any).await.unwrap();
    assert_eq!(owner.display_name(), "T Rois");

    let missing = resolver.get_owner(1, 4, Mode::Any).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn cache_refresh_overwrites_stale_records() {
    let store = Arc::new(MemoryStore::new());
    store
        .store_users(1, vec![User::new(1, "Vieux", "Nom")])
        .await
        .unwrap();
    let api = Arc::new(MockOwnersApi::with_users(vec![User::new(1, "Nouveau", "Nom")]));
    let resolver = resolver(store.clone(), api);

    resolver.cache_actual_owners(1, &[1]).await.unwrap();
    let users = store.find_users(1, &[1]).await.unwrap();
    assert_eq!(users[0].first_name, "Nouveau");
}

#[tokio::test]
async fn ids_partition_by_sign_and_zero_is_the_current_account() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockOwnersApi::with_users(vec![User::new(99, "Moi", "Meme")]));
    api.communities
        .lock()
        .unwrap()
        .push(Community::new(8, "Commune"));
    let resolver = resolver(store, api.clone());

    let bundle = resolver
        .resolve(1, &[0, -8], Mode::Net, Vec::new())
        .await
        .unwrap();
    assert!(bundle.get(99).is_some(), "zero resolves the current account");
    assert!(bundle.get(-8).is_some());
    assert_eq!(*api.user_calls.lock().unwrap(), vec![vec![99]]);
    assert_eq!(*api.community_calls.lock().unwrap(), vec![vec![8]]);
}
