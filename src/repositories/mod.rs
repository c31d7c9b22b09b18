//! Domain repositories backed by the cache repository.

mod priority;

pub use priority::{
    CachingRepository, InMemoryPriorityRepository, PriorityRecord, PriorityRepository,
    PRIORITY_TAG,
};
