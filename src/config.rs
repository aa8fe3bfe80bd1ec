//! Configuration Module
//!
//! Construction options for a cache instance: default TTL, shard layout and
//! the expiration hook.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default number of shards. Must be a power of two.
pub const DEFAULT_SHARD_COUNT: usize = 512;

/// Hook queue slots reserved per shard.
pub const HOOK_QUEUE_SLOTS_PER_SHARD: usize = 10;

/// Default TTL applied by `Cache::set`.
pub const DEFAULT_EXPIRE: Duration = Duration::from_secs(30);

/// Sentinel for entries that never expire.
pub const NO_TTL: Ttl = Ttl::Never;

// == Ttl ==
/// Lifetime of an entry relative to the moment it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The entry never expires
    Never,
    /// The entry expires once the duration has elapsed
    After(Duration),
}

impl Ttl {
    /// Returns the TTL as signed nanoseconds, `<= 0` meaning "never".
    pub(crate) fn as_nanos(self) -> i64 {
        match self {
            Ttl::Never => -1,
            Ttl::After(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        }
    }

    /// Inverse of [`Ttl::as_nanos`].
    pub(crate) fn from_nanos(nanos: i64) -> Self {
        if nanos <= 0 {
            Ttl::Never
        } else {
            Ttl::After(Duration::from_nanos(nanos as u64))
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Ttl::Never
        } else {
            Ttl::After(d)
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(d: Option<Duration>) -> Self {
        d.map(Ttl::from).unwrap_or(Ttl::Never)
    }
}

// == Expired Hook ==
/// Callback invoked with the key of every entry removed by expiration.
pub type ExpiredHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Cache construction options.
#[derive(Clone)]
pub struct CacheConfig {
    /// TTL used by `set` when none is given
    pub default_expire: Ttl,
    /// Number of shards, a non-zero power of two
    pub shard_count: usize,
    /// Capacity of the bounded expired-key queue feeding the hook
    pub hook_queue_capacity: usize,
    /// Hook called for expired keys while hooks are enabled
    pub expired_hook: Option<ExpiredHook>,
    /// Whether expired keys are queued for the hook
    pub expired_hook_enabled: bool,
}

impl CacheConfig {
    /// Sets the default TTL.
    pub fn with_default_expire(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_expire = ttl.into();
        self
    }

    /// Sets the shard count and resizes the hook queue to match.
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self.hook_queue_capacity = shard_count.saturating_mul(HOOK_QUEUE_SLOTS_PER_SHARD);
        self
    }

    /// Overrides the hook queue capacity.
    pub fn with_hook_queue_capacity(mut self, capacity: usize) -> Self {
        self.hook_queue_capacity = capacity;
        self
    }

    /// Installs the expiration hook and enables it.
    pub fn with_expired_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.expired_hook = Some(Arc::new(hook));
        self.expired_hook_enabled = true;
        self
    }

    /// Enables or disables the expiration hook.
    pub fn with_expired_hook_enabled(mut self, enabled: bool) -> Self {
        self.expired_hook_enabled = enabled;
        self
    }

    /// Checks the shard layout and queue sizing.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "shard count must be a non-zero power of two, got {}",
                self.shard_count
            )));
        }
        if self.hook_queue_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "hook queue capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_expire: Ttl::After(DEFAULT_EXPIRE),
            shard_count: DEFAULT_SHARD_COUNT,
            hook_queue_capacity: DEFAULT_SHARD_COUNT * HOOK_QUEUE_SLOTS_PER_SHARD,
            expired_hook: None,
            expired_hook_enabled: false,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("default_expire", &self.default_expire)
            .field("shard_count", &self.shard_count)
            .field("hook_queue_capacity", &self.hook_queue_capacity)
            .field("expired_hook", &self.expired_hook.is_some())
            .field("expired_hook_enabled", &self.expired_hook_enabled)
            .finish()
    }
}
