//! Common Cache - two-level cache repository with tag-based invalidation
//!
//! Redis, Memcached and in-process stores behind one repository API, with
//! key namespacing, tag invalidation and a health/diagnostics HTTP surface.

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheRepository, Store};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
