use std::collections::HashSet;

use d_store::AccountEntity;
use d_store::Error;
use d_store::Storage;
use tokio::task::JoinSet;

use crate::common::account;
use crate::common::user_store;

const WRITERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_lose_nothing() {
    let (_, store) = user_store();
    store.create("kauri", &account("kauri", "initial")).await.unwrap();

    let mut writers = JoinSet::new();
    for i in 0..WRITERS {
        let store = store.clone();
        writers.spawn(async move {
            let password = format!("writer-{i}");
            let result = store.update("kauri", &account("kauri", &password)).await;
            (password, result)
        });
    }

    let mut applied = HashSet::new();
    while let Some(joined) = writers.join_next().await {
        let (password, result) = joined.unwrap();
        match result {
            Ok(()) => {
                applied.insert(password);
            }
            Err(Error::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 5),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert!(!applied.is_empty());
    let mut out = AccountEntity::default();
    store.get("kauri", &mut out).await.unwrap();
    assert!(
        applied.contains(&out.entry().password),
        "final value {} was never acknowledged",
        out.entry().password
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_have_one_winner() {
    let (_, store) = user_store();

    let mut creators = JoinSet::new();
    for i in 0..WRITERS {
        let store = store.clone();
        creators.spawn(async move {
            let password = format!("creator-{i}");
            let result = store.create("kauri", &account("kauri", &password)).await;
            (password, result)
        });
    }

    let mut winners = Vec::new();
    while let Some(joined) = creators.join_next().await {
        let (password, result) = joined.unwrap();
        match result {
            Ok(()) => winners.push(password),
            Err(e) => assert!(e.is_already_exists(), "unexpected error: {e:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let mut out = AccountEntity::default();
    store.get("kauri", &mut out).await.unwrap();
    assert_eq!(out.entry().password, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_have_one_winner() {
    let (_, store) = user_store();
    store.create("kauri", &account("kauri", "p1")).await.unwrap();

    let mut deleters = JoinSet::new();
    for _ in 0..WRITERS {
        let store = store.clone();
        deleters.spawn(async move { store.delete("kauri").await });
    }

    let mut deleted = 0;
    while let Some(joined) = deleters.join_next().await {
        match joined.unwrap() {
            Ok(()) => deleted += 1,
            Err(e) => assert!(e.is_not_found(), "unexpected error: {e:?}"),
        }
    }
    assert_eq!(deleted, 1);
}
