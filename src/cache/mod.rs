//! Cache Module
//!
//! Store backends, the tag index, the two-level store and the cache repository
//! that ties them together.

mod entry;
mod key;
mod lru;
mod repository;
mod stats;
pub mod store;
mod tags;
mod two_level;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use key::{CacheKey, Namespace, RESERVED_KEY_SPACE};
pub use repository::{CacheRepository, TagFlushReport};
pub use stats::CacheStats;
pub use store::{ArrayStore, MemcachedStore, RedisStore, Store};
pub use tags::TagIndex;
pub use two_level::TwoLevelStore;

// == Public Constants ==
/// Maximum allowed prepared key length in bytes (Memcached's limit)
pub const MAX_KEY_LENGTH: usize = 250;

/// Maximum allowed value size in bytes for the in-process store
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
