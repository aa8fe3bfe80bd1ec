//! Shard Module
//!
//! Partitioned storage: a fixed array of independently locked maps, each
//! covering the slice of the key space that hashes onto it.

use std::collections::HashMap;

use parking_lot::RwLock;
use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::Entry;

// == Shard ==
/// One partition of the key space.
#[derive(Debug)]
pub struct Shard<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> Default for Shard<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> Shard<V> {
    /// Returns a copy of the entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<Entry<V>> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `entry`, returning the entry it replaced.
    pub fn insert(&self, key: String, entry: Entry<V>) -> Option<Entry<V>> {
        self.entries.write().insert(key, entry)
    }

    /// Removes `key` unconditionally.
    pub fn remove(&self, key: &str) -> Option<Entry<V>> {
        self.entries.write().remove(key)
    }

    /// Removes `key` only if it is still present and expired at `now`.
    ///
    /// A value re-set between discovery and removal is left alone.
    pub fn remove_if_expired(&self, key: &str, now: i64) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_valid(now) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Keys whose entries have expired at `now`.
    pub fn expired_keys(&self, now: i64) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_valid(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Copies every entry out of the shard.
    ///
    /// The lock is held only for the copy, so callers may touch the cache
    /// while walking the result.
    pub fn snapshot(&self) -> Vec<(String, Entry<V>)> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Swaps in an empty map and returns how many entries were dropped.
    pub fn reset(&self) -> usize {
        let old = std::mem::take(&mut *self.entries.write());
        old.len()
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

// == Shard Table ==
/// Fixed-size array of shards with hash-and-mask routing.
///
/// The shard count never changes for the table's lifetime, so a key always
/// routes to the same shard.
#[derive(Debug)]
pub struct ShardTable<V> {
    shards: Box<[Shard<V>]>,
    mask: u64,
}

impl<V: Clone + Send + Sync> ShardTable<V> {
    // == Constructor ==
    /// Creates `shard_count` empty shards.
    ///
    /// `shard_count` must be a non-zero power of two; `CacheConfig::validate`
    /// enforces this before a table is built.
    pub fn new(shard_count: usize) -> Self {
        debug_assert!(shard_count.is_power_of_two());
        let shards = (0..shard_count).map(|_| Shard::default()).collect();
        Self {
            shards,
            mask: (shard_count as u64).wrapping_sub(1),
        }
    }

    /// Index of the shard owning `key`.
    pub fn route(&self, key: &str) -> usize {
        (xxh3_64(key.as_bytes()) & self.mask) as usize
    }

    /// The shard owning `key`.
    pub fn shard(&self, key: &str) -> &Shard<V> {
        &self.shards[self.route(key)]
    }

    pub fn get(&self, key: &str) -> Option<Entry<V>> {
        self.shard(key).get(key)
    }

    pub fn set(&self, key: String, entry: Entry<V>) -> Option<Entry<V>> {
        self.shard(&key).insert(key, entry)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.shard(key).remove(key).is_some()
    }

    /// Runs `f` on every shard in parallel and waits for all of them.
    pub fn for_each_shard_parallel<F>(&self, f: F)
    where
        F: Fn(&Shard<V>) + Send + Sync,
    {
        self.shards.par_iter().for_each(|shard| f(shard));
    }

    /// Empties every shard, returning the number of entries dropped.
    pub fn clear(&self) -> usize {
        self.shards.iter().map(Shard::reset).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Entries held across all shards, expired ones included.
    pub fn stored(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_route_is_stable_and_in_range() {
        let table: ShardTable<u32> = ShardTable::new(16);
        for i in 0..1000 {
            let key = format!("key{i}");
            let idx = table.route(&key);
            assert!(idx < 16);
            assert_eq!(idx, table.route(&key));
        }
    }

    #[test]
    fn test_keys_spread_across_shards() {
        let table: ShardTable<u32> = ShardTable::new(8);
        let used: HashSet<usize> = (0..1000).map(|i| table.route(&format!("k{i}"))).collect();
        assert_eq!(used.len(), 8);
    }

    #[test]
    fn test_single_shard_table() {
        let table: ShardTable<u32> = ShardTable::new(1);
        assert_eq!(table.route("anything"), 0);
        table.set("a".to_string(), Entry::new(1, 0, 0));
        assert_eq!(table.get("a").map(|e| e.value), Some(1));
    }

    #[test]
    fn test_set_get_delete() {
        let table: ShardTable<String> = ShardTable::new(4);

        assert!(table.set("a".to_string(), Entry::new("1".to_string(), 0, 0)).is_none());
        let old = table.set("a".to_string(), Entry::new("2".to_string(), 0, 0));
        assert_eq!(old.map(|e| e.value), Some("1".to_string()));
        assert_eq!(table.get("a").map(|e| e.value), Some("2".to_string()));

        assert!(table.delete("a"));
        assert!(!table.delete("a"));
        assert!(table.get("a").is_none());
    }

    #[test]
    fn test_remove_if_expired() {
        let shard: Shard<u32> = Shard::default();
        shard.insert("old".to_string(), Entry { value: 1, expire_at: 10 });
        shard.insert("live".to_string(), Entry { value: 2, expire_at: 1_000 });

        assert_eq!(shard.expired_keys(500), vec!["old".to_string()]);
        assert!(shard.remove_if_expired("old", 500));
        assert!(!shard.remove_if_expired("old", 500));
        assert!(!shard.remove_if_expired("live", 500));
        assert!(!shard.remove_if_expired("missing", 500));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_for_each_shard_parallel_visits_all() {
        let table: ShardTable<u32> = ShardTable::new(32);
        let visited = AtomicUsize::new(0);
        table.for_each_shard_parallel(|_| {
            visited.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visited.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn test_clear_counts_dropped_entries() {
        let table: ShardTable<u32> = ShardTable::new(4);
        for i in 0..10 {
            table.set(format!("k{i}"), Entry::new(i, 0, 0));
        }
        assert_eq!(table.stored(), 10);
        assert_eq!(table.clear(), 10);
        assert_eq!(table.stored(), 0);
    }
}
