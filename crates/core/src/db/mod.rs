//! Subscription store, watcher configuration, and home-directory layout.
//!
//! This module wraps a SQLite database storing:
//! - Tracked subscriptions (contact address, identity fields, last outcome,
//!   last observed available locations, last-check timestamp)
//! - An operational event log (transport failures, unrecognized pages,
//!   notifications) for operator statistics
//!
//! plus the pieces frontends need to find it:
//! - `WatchConfig`: serializable watcher configuration.
//! - `HomeLayout`: computed paths for the watcher home directory.
//! - `WatchContext`: convenience bundle of layout + config + open store.

pub mod config;
pub mod context;
pub mod layout;
pub mod models;
pub mod store;
pub mod util;

pub use config::{DbConfig, WatchConfig};
pub use context::WatchContext;
pub use layout::HomeLayout;
pub use models::SubscriptionRecord;
pub use store::{StoreError, StoreResult, SubscriptionDb, CURRENT_SCHEMA_VERSION};
pub use util::{load_config, open_store};
