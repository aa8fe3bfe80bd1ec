//! Cache Store Module
//!
//! The public cache handle: sharded storage with lazy TTL expiration,
//! deduplicated eviction and hook notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::eviction::{EvictionGroup, Outcome};
use crate::cache::{now_nanos, CacheStats, Entry, ShardTable, StatsRecorder};
use crate::config::{CacheConfig, ExpiredHook, Ttl};
use crate::error::Result;
use crate::tasks::SweeperHandle;

// == Shared State ==
pub(crate) struct Inner<V> {
    pub(crate) table: ShardTable<V>,
    evictions: EvictionGroup,
    /// Live key count; signed so a racing delete/insert pair cannot wrap it
    len: AtomicI64,
    default_expire: AtomicI64,
    hook_enabled: AtomicBool,
    pub(crate) hook: RwLock<Option<ExpiredHook>>,
    hook_tx: mpsc::Sender<String>,
    pub(crate) hook_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    pub(crate) stats: StatsRecorder,
    pub(crate) sweeper: Mutex<Option<SweeperHandle>>,
}

// == Cache ==
/// A sharded, time-expiring key/value cache.
///
/// `Cache` is a handle: clones share the same table, configuration and
/// sweeper. Lookups never return expired values; an expired entry found on
/// any read path is evicted on the spot, exactly once per expiration even if
/// several callers discover it together.
pub struct Cache<V> {
    pub(crate) inner: Arc<Inner<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> {
    // == Constructors ==
    /// Creates a cache with the default configuration (512 shards, 30 second
    /// default TTL, hooks disabled).
    pub fn new() -> Self {
        Self::build(CacheConfig::default())
    }

    /// Creates a cache from validated options.
    ///
    /// # Arguments
    /// * `config` - Shard layout, default TTL and hook settings
    ///
    /// # Returns
    /// `Err(CacheError::InvalidConfig)` if the shard count is not a non-zero
    /// power of two or the hook queue capacity is zero.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        let (hook_tx, hook_rx) = mpsc::channel(config.hook_queue_capacity);
        Self {
            inner: Arc::new(Inner {
                table: ShardTable::new(config.shard_count),
                evictions: EvictionGroup::new(),
                len: AtomicI64::new(0),
                default_expire: AtomicI64::new(config.default_expire.as_nanos()),
                hook_enabled: AtomicBool::new(config.expired_hook_enabled),
                hook: RwLock::new(config.expired_hook),
                hook_tx,
                hook_rx: Arc::new(tokio::sync::Mutex::new(hook_rx)),
                stats: StatsRecorder::default(),
                sweeper: Mutex::new(None),
            }),
        }
    }

    // == Configuration ==
    /// Changes the TTL applied by [`Cache::set`] from now on.
    pub fn set_default_expire(&self, ttl: impl Into<Ttl>) -> &Self {
        self.inner
            .default_expire
            .store(ttl.into().as_nanos(), Ordering::Relaxed);
        self
    }

    /// Current default TTL.
    pub fn default_expire(&self) -> Ttl {
        Ttl::from_nanos(self.inner.default_expire.load(Ordering::Relaxed))
    }

    pub fn enable_expired_hook(&self) -> &Self {
        self.inner.hook_enabled.store(true, Ordering::Relaxed);
        self
    }

    pub fn disable_expired_hook(&self) -> &Self {
        self.inner.hook_enabled.store(false, Ordering::Relaxed);
        self
    }

    /// Installs the callback run for each expired key.
    ///
    /// Delivery only happens while hooks are enabled and the sweeper is
    /// running; see [`Cache::start_expired`].
    pub fn set_expired_hook<F>(&self, hook: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.hook.write() = Some(Arc::new(hook));
        self
    }

    // == Get ==
    /// Returns the value stored under `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).map(|entry| entry.value)
    }

    /// Returns the value and its expiration timestamp (Unix nanoseconds,
    /// `0` for entries that never expire).
    pub fn get_with_expire(&self, key: &str) -> Option<(V, i64)> {
        self.lookup(key).map(|entry| (entry.value, entry.expire_at))
    }

    fn lookup(&self, key: &str) -> Option<Entry<V>> {
        let Some(entry) = self.inner.table.get(key) else {
            self.inner.stats.record_miss();
            return None;
        };

        if entry.is_valid(now_nanos()) {
            self.inner.stats.record_hit();
            return Some(entry);
        }

        self.inner.stats.record_miss();
        self.expire(key);
        None
    }

    // == Set ==
    /// Stores `value` under `key` using the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let ttl = self.inner.default_expire.load(Ordering::Relaxed);
        self.store(key.into(), value, ttl);
    }

    /// Stores `value` under `key` with an explicit TTL.
    ///
    /// If the key already exists, the whole entry is replaced and the TTL
    /// restarts.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - A `Duration` or [`Ttl`]; [`Ttl::Never`] or a zero duration
    ///   stores the value without expiration
    pub fn set_with_expire(&self, key: impl Into<String>, value: V, ttl: impl Into<Ttl>) {
        self.store(key.into(), value, ttl.into().as_nanos());
    }

    fn store(&self, key: String, value: V, ttl_nanos: i64) {
        let entry = Entry::new(value, ttl_nanos, now_nanos());
        if self.inner.table.set(key, entry).is_none() {
            self.inner.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    // == Delete ==
    /// Removes `key`, returning whether a value was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.table.delete(key);
        if removed {
            self.inner.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    // == Expiration ==
    /// Evicts `key` if it is still expired, notifying the hook queue.
    ///
    /// Concurrent calls for the same key share a single run.
    pub(crate) fn expire(&self, key: &str) -> Outcome {
        let inner = &self.inner;
        inner.evictions.run(key, || {
            if !inner.table.shard(key).remove_if_expired(key, now_nanos()) {
                return false;
            }
            inner.len.fetch_sub(1, Ordering::Relaxed);
            inner.stats.record_expiration();
            if inner.hook_enabled.load(Ordering::Relaxed) {
                self.notify_expired(key);
            }
            true
        })
    }

    fn notify_expired(&self, key: &str) {
        if let Err(err) = self.inner.hook_tx.try_send(key.to_string()) {
            self.inner.stats.record_hook_drop();
            warn!(key = %key, "Expired hook queue unavailable, dropping notification: {}", err);
        }
    }

    /// Scans every shard and evicts expired entries.
    ///
    /// Blocks until all shards are scanned or `token` is cancelled. Entries
    /// evicted before a cancellation stay evicted.
    ///
    /// # Arguments
    /// * `token` - Checked before every eviction; stops each shard's scan
    ///
    /// # Returns
    /// The number of entries this call evicted. Entries removed by a
    /// concurrent caller for the same key are not counted.
    pub fn delete_expired(&self, token: &CancellationToken) -> usize {
        let evicted = AtomicUsize::new(0);
        self.inner.table.for_each_shard_parallel(|shard| {
            if token.is_cancelled() {
                return;
            }
            for key in shard.expired_keys(now_nanos()) {
                if token.is_cancelled() {
                    break;
                }
                let outcome = self.expire(&key);
                if outcome.removed && !outcome.shared {
                    evicted.fetch_add(1, Ordering::Relaxed);
                }
                std::thread::yield_now();
            }
        });
        evicted.into_inner()
    }

    // == Range ==
    /// Calls `f(key, value, expire_at)` for every live entry.
    ///
    /// Shards are walked in parallel, so `f` may run concurrently from
    /// several threads. A shard's walk stops when `f` returns false or
    /// `token` is cancelled; other shards continue. Entries inserted or
    /// removed during the walk may or may not be seen. Expired entries are
    /// evicted instead of being passed to `f`.
    ///
    /// # Arguments
    /// * `token` - Checked before every entry; stops each shard's walk
    /// * `f` - Receives key, value and expiration timestamp (Unix
    ///   nanoseconds, `0` = never); returning false stops its shard
    pub fn range<F>(&self, token: &CancellationToken, f: F) -> &Self
    where
        F: Fn(&str, &V, i64) -> bool + Send + Sync,
    {
        self.inner.table.for_each_shard_parallel(|shard| {
            if token.is_cancelled() {
                return;
            }
            let now = now_nanos();
            for (key, entry) in shard.snapshot() {
                if token.is_cancelled() {
                    break;
                }
                if !entry.is_valid(now) {
                    self.expire(&key);
                    continue;
                }
                if !f(&key, &entry.value, entry.expire_at) {
                    break;
                }
            }
        });
        self
    }

    /// Collects every live entry into a concurrent map.
    pub fn to_map(&self, token: &CancellationToken) -> DashMap<String, V> {
        let map = DashMap::with_capacity(self.len());
        self.range(token, |key, value, _| {
            map.insert(key.to_string(), value.clone());
            true
        });
        map
    }

    /// Collects every live entry into a plain `HashMap`.
    pub fn to_raw_map(&self, token: &CancellationToken) -> HashMap<String, V> {
        let map = Mutex::new(HashMap::with_capacity(self.len()));
        self.range(token, |key, value, _| {
            map.lock().insert(key.to_string(), value.clone());
            true
        });
        map.into_inner()
    }

    // == Size ==
    /// Number of keys currently stored.
    ///
    /// Expired entries still count until they are evicted by a lookup, a
    /// range or the sweeper.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry in every shard.
    pub fn clear(&self) {
        let dropped = self.inner.table.clear();
        self.inner.len.fetch_sub(dropped as i64, Ordering::Relaxed);
    }

    /// Number of shards the key space is split across.
    pub fn shard_count(&self) -> usize {
        self.inner.table.shard_count()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len(), self.inner.table.stored())
    }
}
