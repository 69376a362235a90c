use std::sync::Arc;
use std::time::Duration;

use d_store::Account;
use d_store::AccountEntity;
use d_store::MemCoordinator;
use d_store::Store;
use d_store::StoreConfig;
use d_store::WatchEvent;
use d_store::WatchHandle;
use tokio::time::timeout;

/// Upper bound for any single watch event to arrive
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub const USER_PREFIX: &str = "user";

pub fn account(
    id: &str,
    password: &str,
) -> AccountEntity {
    AccountEntity::new(Account::new(id, password))
}

pub fn user_store() -> (Arc<MemCoordinator>, Store<MemCoordinator>) {
    crate::enable_logger();
    let coordinator = Arc::new(MemCoordinator::new());
    let store = Store::new(coordinator.clone(), USER_PREFIX);
    (coordinator, store)
}

pub fn user_store_with(config: StoreConfig) -> (Arc<MemCoordinator>, Store<MemCoordinator>) {
    crate::enable_logger();
    let coordinator = Arc::new(MemCoordinator::new());
    let store = Store::with_config(coordinator.clone(), USER_PREFIX, config);
    (coordinator, store)
}

/// Next event, failing the test if none arrives in time
pub async fn expect_event(handle: &mut WatchHandle<AccountEntity>) -> WatchEvent<AccountEntity> {
    timeout(EVENT_TIMEOUT, handle.recv())
        .await
        .expect("timed out waiting for watch event")
        .expect("watch ended early")
}

/// Asserts the watch ends without further events
pub async fn expect_end(handle: &mut WatchHandle<AccountEntity>) {
    let next = timeout(EVENT_TIMEOUT, handle.recv())
        .await
        .expect("timed out waiting for watch end");
    assert!(next.is_none(), "unexpected event: {next:?}");
}
