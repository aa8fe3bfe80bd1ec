//! Shard Cache - a sharded in-process key/value cache
//!
//! Stores values under string keys across independently locked shards, with
//! absolute-time TTL expiration, a background sweeper, deduplicated
//! expiration hooks and whole-table snapshot persistence.
//!
//! # Example
//! ```ignore
//! use std::time::Duration;
//! use shard_cache::{Cache, CancellationToken, NO_TTL};
//!
//! let cache: Cache<String> = Cache::new();
//! cache.set_with_expire("greeting", "hello".to_string(), NO_TTL);
//! cache.set_with_expire("session", "abc".to_string(), Duration::from_secs(60));
//! assert_eq!(cache.get("greeting").as_deref(), Some("hello"));
//!
//! let token = CancellationToken::new();
//! cache.start_expired(&token, Duration::from_secs(1));
//! ```

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheStats};
pub use config::{CacheConfig, ExpiredHook, Ttl, NO_TTL};
pub use error::{CacheError, Result};
pub use tokio_util::sync::CancellationToken;
