//! `stockroom-client`
//!
//! **Responsibility:** Inventory client runtime.
//!
//! This crate provides:
//! - Access to the remote item store (`/api/items`)
//! - The view state machine: optimistic delete with an undo grace period,
//!   grouped delete, add/edit form submission, transient notices
//! - A session that runs store requests and timers and feeds their results
//!   back into the view state
//!
//! The remote store stays the authority; the client never persists anything.

pub mod config;
pub mod fetch;
pub mod memory;
pub mod session;
pub mod store;
pub mod timer;
pub mod types;
pub mod view;

pub use config::{ClientConfig, ConfigError};
pub use fetch::{FetchOutcome, decode_item_list, fetch_items};
pub use memory::MemoryStore;
pub use session::Session;
pub use store::{HttpStore, ItemStore, StoreError};
pub use types::{ConnectivityState, DeleteMode, Notice, NoticeLevel, SaveMode};
pub use view::{DeleteIntent, DeletePhase, Effect, Event, IntentError, ViewState};
