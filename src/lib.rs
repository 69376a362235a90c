//! # d-store
//!
//! Generic object storage over a strongly consistent, revisioned key-value
//! coordinator such as etcd.
//!
//! ## Features
//! - **At-most-once create** guarded by the coordinator's creation revision
//! - **Lost-update-free writes** through `mod_revision` fencing with
//!   configurable retry policies
//! - **Typed watches** translating the coordinator's mutation log into
//!   `Added` / `Modified` / `Deleted` / `Error` events with backpressure
//! - **Pluggable coordinators**: in-process [`MemCoordinator`], or etcd
//!   behind the `etcd` feature
//!
//! ## Quick Start
//! ```rust
//! use std::sync::Arc;
//!
//! use d_store::{Account, AccountEntity, MemCoordinator, Storage, Store};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> d_store::Result<()> {
//! let store = Store::new(Arc::new(MemCoordinator::new()), "user");
//!
//! store.create("kauri", &AccountEntity::new(Account::new("kauri", "p1"))).await?;
//!
//! let mut out = AccountEntity::default();
//! store.get("kauri", &mut out).await?;
//! assert_eq!(out.entry().password, "p1");
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod errors;
mod model;
mod object;

pub mod coordinator;
pub mod metrics;
pub mod storage;
pub mod watch;

pub use config::*;
pub use coordinator::Coordinator;
pub use coordinator::MemCoordinator;
#[cfg(feature = "etcd")]
pub use coordinator::EtcdCoordinator;
pub use errors::*;
pub use metrics::gather_metrics;
pub use model::*;
pub use object::*;
pub use storage::GroupResource;
pub use storage::ListSummary;
pub use storage::Storage;
pub use storage::Store;
pub use watch::WatchEvent;
pub use watch::WatchEventType;
pub use watch::WatchHandle;
