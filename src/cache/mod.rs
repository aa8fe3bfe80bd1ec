//! Cache Module
//!
//! Provides the sharded cache engine: partitioned storage, TTL expiration,
//! deduplicated eviction and snapshot persistence.

mod entry;
mod eviction;
mod shard;
mod snapshot;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{now_nanos, Entry};
pub use stats::CacheStats;
pub use store::Cache;

pub(crate) use shard::ShardTable;
pub(crate) use stats::StatsRecorder;
pub(crate) use store::Inner;
