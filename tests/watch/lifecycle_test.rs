use std::time::Duration;

use d_store::AccountEntity;
use d_store::Storage;
use d_store::Store;
use d_store::StoreConfig;
use d_store::Token;
use d_store::TokenEntity;
use d_store::WatchEvent;
use d_store::WatchEventType;
use futures::StreamExt;
use tokio::time::timeout;

use crate::common::account;
use crate::common::expect_end;
use crate::common::expect_event;
use crate::common::user_store;
use crate::common::user_store_with;
use crate::common::EVENT_TIMEOUT;

#[tokio::test]
async fn test_create_update_delete_are_classified() {
    let (_, store) = user_store();
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    store.create("kauri", &account("kauri", "p1")).await.unwrap();
    store.update("kauri", &account("kauri", "p2")).await.unwrap();
    store.delete("kauri").await.unwrap();

    match expect_event(&mut handle).await {
        WatchEvent::Added { key, object } => {
            assert_eq!(key, "kauri");
            assert_eq!(object.entry().password, "p1");
        }
        other => panic!("expected Added, got {other:?}"),
    }
    match expect_event(&mut handle).await {
        WatchEvent::Modified { key, object } => {
            assert_eq!(key, "kauri");
            assert_eq!(object.entry().password, "p2");
        }
        other => panic!("expected Modified, got {other:?}"),
    }
    match expect_event(&mut handle).await {
        WatchEvent::Deleted { key, object } => {
            assert_eq!(key, "kauri");
            assert_eq!(object.entry().password, "p2", "Deleted carries the pre-delete value");
        }
        other => panic!("expected Deleted, got {other:?}"),
    }

    handle.stop();
    expect_end(&mut handle).await;
}

#[tokio::test]
async fn test_recreated_key_is_added_again() {
    let (_, store) = user_store();
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    store.create("kauri", &account("kauri", "p1")).await.unwrap();
    store.delete("kauri").await.unwrap();
    store.create("kauri", &account("kauri", "p2")).await.unwrap();

    let kinds = [
        expect_event(&mut handle).await.event_type(),
        expect_event(&mut handle).await.event_type(),
        expect_event(&mut handle).await.event_type(),
    ];
    assert_eq!(
        kinds,
        [WatchEventType::Added, WatchEventType::Deleted, WatchEventType::Added]
    );
}

#[tokio::test]
async fn test_no_history_replay() {
    let (_, store) = user_store();
    store.create("before", &account("before", "p")).await.unwrap();

    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();
    store.create("after", &account("after", "p")).await.unwrap();

    let event = expect_event(&mut handle).await;
    assert_eq!(event.key(), Some("after"));
}

#[tokio::test]
async fn test_double_stop_and_stop_after_end() {
    let (coordinator, store) = user_store();
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    coordinator.cancel_watchers("compacted");
    let event = expect_event(&mut handle).await;
    assert!(event.is_error());
    expect_end(&mut handle).await;

    handle.stop();
    handle.stop();
    assert!(handle.is_stopped());
    expect_end(&mut handle).await;
}

#[tokio::test]
async fn test_coordinator_cancel_yields_exactly_one_error() {
    let (coordinator, store) = user_store();
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    store.create("kauri", &account("kauri", "p1")).await.unwrap();
    coordinator.cancel_watchers("leader lost");

    assert_eq!(expect_event(&mut handle).await.event_type(), WatchEventType::Added);
    match expect_event(&mut handle).await {
        WatchEvent::Error { reason } => assert!(reason.contains("leader lost"), "{reason}"),
        other => panic!("expected Error, got {other:?}"),
    }
    expect_end(&mut handle).await;

    // A fresh watch works after the old one was cancelled
    let mut fresh = store.watch("", &AccountEntity::default()).await.unwrap();
    store.update("kauri", &account("kauri", "p2")).await.unwrap();
    assert_eq!(expect_event(&mut fresh).await.event_type(), WatchEventType::Modified);
}

#[tokio::test]
async fn test_corrupt_record_does_not_end_watch() {
    let (coordinator, store) = user_store();
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    coordinator.put("/user/broken", "{\"id\":");
    store.create("kauri", &account("kauri", "p1")).await.unwrap();

    assert!(expect_event(&mut handle).await.is_error());
    assert_eq!(expect_event(&mut handle).await.key(), Some("kauri"));
}

#[tokio::test]
async fn test_slow_consumer_sees_every_event_in_order() {
    let mut config = StoreConfig::default();
    config.watch.event_buffer_size = 2;
    let (_, store) = user_store_with(config);
    let mut handle = store.watch("", &AccountEntity::default()).await.unwrap();

    for i in 0..20 {
        store.create(&format!("k{i:02}"), &account("x", "p")).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    for i in 0..20 {
        let event = expect_event(&mut handle).await;
        assert_eq!(event.key(), Some(format!("k{i:02}").as_str()));
    }
}

#[tokio::test]
async fn test_stop_while_listener_is_blocked() {
    let mut config = StoreConfig::default();
    config.watch.event_buffer_size = 1;
    let (coordinator, store) = user_store_with(config);
    let handle = store.watch("", &AccountEntity::default()).await.unwrap();

    for i in 0..5 {
        store.create(&format!("k{i}"), &account("x", "p")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    timeout(EVENT_TIMEOUT, handle.shutdown())
        .await
        .expect("blocked listener ignored stop");
    assert_eq!(coordinator.watcher_count(), 0);
}

#[tokio::test]
async fn test_watch_prefixes_are_isolated() {
    let (_, store) = user_store();
    let mut teams = store.watch("teams", &AccountEntity::default()).await.unwrap();

    store.create("kauri", &account("kauri", "p")).await.unwrap();
    store.create("teams/blue", &account("blue", "p")).await.unwrap();

    let event = expect_event(&mut teams).await;
    assert_eq!(event.key(), Some("teams/blue"));
}

#[tokio::test]
async fn test_key_watch_skips_keys_sharing_its_name() {
    let (_, store) = user_store();
    let mut handle = store.watch("kauri", &AccountEntity::default()).await.unwrap();

    store.create("kauri2", &account("kauri2", "p")).await.unwrap();
    store.create("kauri-old", &account("kauri-old", "p")).await.unwrap();
    store.create("kauri", &account("kauri", "p")).await.unwrap();

    let event = expect_event(&mut handle).await;
    assert_eq!(event.event_type(), WatchEventType::Added);
    assert_eq!(event.key(), Some("kauri"));
}

#[tokio::test]
async fn test_slow_watcher_survives_writes_to_another_store() {
    let mut config = StoreConfig::default();
    config.watch.event_buffer_size = 2;
    let (coordinator, users) = user_store_with(config);
    let tokens = Store::new(coordinator.clone(), "token");
    let mut handle = users.watch("", &AccountEntity::default()).await.unwrap();

    for i in 0..3 {
        users.create(&format!("u{i}"), &account("x", "p")).await.unwrap();
    }
    for i in 0..10 {
        let token = TokenEntity::new(Token {
            token: format!("t{i}"),
            username: "x".into(),
            expires_at: 0,
        });
        tokens.create(&format!("t{i}"), &token).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..3 {
        let event = expect_event(&mut handle).await;
        assert_eq!(event.event_type(), WatchEventType::Added);
        assert_eq!(event.key(), Some(format!("u{i}").as_str()));
    }

    users.create("late", &account("late", "p")).await.unwrap();
    let event = expect_event(&mut handle).await;
    assert_eq!(event.event_type(), WatchEventType::Added);
    assert_eq!(event.key(), Some("late"));
    assert_eq!(coordinator.watcher_count(), 1);
}

#[tokio::test]
async fn test_handle_as_stream() {
    let (_, store) = user_store();
    let handle = store.watch("", &AccountEntity::default()).await.unwrap();

    store.create("a", &account("a", "p")).await.unwrap();
    store.create("b", &account("b", "p")).await.unwrap();

    let keys: Vec<String> = timeout(
        EVENT_TIMEOUT,
        handle
            .filter_map(|e| async move { e.key().map(str::to_string) })
            .take(2)
            .collect(),
    )
    .await
    .unwrap();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_store_shutdown_ends_every_watch() {
    let (_, store) = user_store();
    let mut a = store.watch("", &AccountEntity::default()).await.unwrap();
    let mut b = store.watch("teams", &AccountEntity::default()).await.unwrap();

    store.shutdown();

    expect_end(&mut a).await;
    expect_end(&mut b).await;
}
