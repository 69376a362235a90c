//! Watch mechanism for monitoring changes under a store prefix
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐
//! │  Coordinator    │ change stream over <prefix>/<key>
//! └──────┬──────────┘
//!        │ put / delete mutations (revision order)
//!        ▼
//! ┌─────────────────┐
//! │ WatchTranslator │ (tokio task, one per watch)
//! │ Added/Modified/ │
//! │ Deleted/Error   │
//! └──────┬──────────┘
//!        │ tokio mpsc, bounded (watch.event_buffer_size)
//!        ▼
//! ┌─────────────────┐
//! │  WatchHandle    │ recv() / Stream, stop()
//! └─────────────────┘
//! ```
//!
//! # Delivery
//!
//! When a consumer falls behind, the listener blocks on the bounded queue
//! rather than dropping events, so per-key order is always preserved. A
//! blocked listener still honours `stop()` immediately.
//!
//! # Classification
//!
//! A put whose `create_revision` equals its `mod_revision` is the first
//! write of the key and becomes `Added`; any other put is `Modified`. A
//! delete becomes `Deleted` carrying the previous value.

mod event;
mod handle;
pub(crate) mod translator;


pub use event::*;
pub use handle::*;
pub use tokio::sync::mpsc::error::TryRecvError;
