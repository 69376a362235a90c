use std::sync::Arc;

use d_store::AccountEntity;
use d_store::Coordinator;
use d_store::Error;
use d_store::GroupResource;
use d_store::MemCoordinator;
use d_store::Object;
use d_store::Storage;
use d_store::Store;
use d_store::StoreConfig;

use crate::common::account;
use crate::common::user_store;

/// create, get, update, list, delete under `user/` with key `kauri`
#[tokio::test]
async fn test_kauri_lifecycle() {
    let (coordinator, store) = user_store();
    let original = account("kauri", "2024-01-01T00:00:00Z");

    store.create("kauri", &original).await.unwrap();

    let mut out = AccountEntity::default();
    store.get("kauri", &mut out).await.unwrap();
    assert_eq!(out, original);

    let mut changed = original.clone();
    changed.entry_mut().password = "newpassword".to_string();
    store.update("kauri", &changed).await.unwrap();

    let mut list = Vec::new();
    let summary = store.get_list(&out, &mut list).await.unwrap();
    assert_eq!(summary.listed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(list[0].entry().password, "newpassword");

    store.delete("kauri").await.unwrap();
    let err = store.get("kauri", &mut out).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(coordinator.is_empty());
}

#[tokio::test]
async fn test_persisted_layout_is_prefix_plus_key_with_json_value() {
    let (coordinator, store) = user_store();
    store.create("kauri", &account("kauri", "p1")).await.unwrap();

    let kv = coordinator.get("/user/kauri").await.unwrap().unwrap();
    let text = std::str::from_utf8(&kv.value).unwrap();
    assert!(text.contains("\"id\":\"kauri\""), "{text}");
    assert!(text.contains("\"password\":\"p1\""), "{text}");
}

#[tokio::test]
async fn test_create_is_at_most_once() {
    let (_, store) = user_store();
    store.create("kauri", &account("kauri", "first")).await.unwrap();

    for _ in 0..3 {
        let err = store.create("kauri", &account("kauri", "again")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref key } if key == "kauri"));
    }

    let mut out = AccountEntity::default();
    store.get("kauri", &mut out).await.unwrap();
    assert_eq!(out.entry().password, "first");
}

#[tokio::test]
async fn test_recreate_after_delete() {
    let (coordinator, store) = user_store();
    store.create("kauri", &account("kauri", "p1")).await.unwrap();
    store.delete("kauri").await.unwrap();

    store.create("kauri", &account("kauri", "p2")).await.unwrap();

    let kv = coordinator.get("/user/kauri").await.unwrap().unwrap();
    assert_eq!(kv.create_revision, kv.mod_revision);
    assert_eq!(kv.version, 1);
}

#[tokio::test]
async fn test_get_list_on_empty_prefix() {
    let (_, store) = user_store();
    let mut list: Vec<AccountEntity> = Vec::new();

    let summary = store.get_list(&AccountEntity::default(), &mut list).await.unwrap();

    assert_eq!(summary.listed, 0);
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_resources_share_a_coordinator_without_overlap() {
    let coordinator = Arc::new(MemCoordinator::new());
    let users = Store::for_resource(
        coordinator.clone(),
        &GroupResource::new("auth", "users"),
        StoreConfig::default(),
    );
    let tokens = Store::for_resource(
        coordinator.clone(),
        &GroupResource::new("auth", "tokens"),
        StoreConfig::default(),
    );

    users.create("kauri", &account("kauri", "p1")).await.unwrap();
    tokens.create("abc123", &account("kauri", "t")).await.unwrap();

    let mut list = Vec::new();
    users.get_list(&AccountEntity::default(), &mut list).await.unwrap();
    assert_eq!(list.len(), 1);

    let mut out = AccountEntity::default();
    assert!(tokens.get("kauri", &mut out).await.unwrap_err().is_not_found());
    assert_eq!(coordinator.len(), 2);
}

#[tokio::test]
async fn test_roundtrip_through_clone() {
    let value = account("kauri", "p1");
    let bytes = value.encode().unwrap();

    let mut decoded = value.clone_object();
    decoded.entry_mut().password.clear();
    decoded.decode(&bytes).unwrap();

    assert_eq!(decoded, value);
}
