//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain `HashMap` model.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::config::{CacheConfig, NO_TTL};

// == Test Configuration ==
const TEST_SHARD_COUNT: usize = 16;

fn test_cache<V: Clone + Send + Sync>() -> Cache<V> {
    Cache::with_config(CacheConfig::default().with_shard_count(TEST_SHARD_COUNT)).unwrap()
}

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}"
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,256}"
}

/// Operations applied to both the cache and the model
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // A small key alphabet so operations collide on the same keys.
    let key = "[a-e]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any interleaving of set/get/delete matches a HashMap, and `len` is the
    // exact number of distinct live keys.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let cache: Cache<String> = test_cache();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set_with_expire(key.clone(), value.clone(), NO_TTL);
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key).cloned());
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(cache.delete(&key), model.remove(&key).is_some());
                }
            }
            prop_assert_eq!(cache.len(), model.len(), "Len drifted from model");
        }
    }

    // Storing a pair and reading it back returns the stored value.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let cache: Cache<String> = test_cache();
        cache.set(key.clone(), value.clone());
        prop_assert_eq!(cache.get(&key), Some(value));
    }

    // Deleting an absent key reports false and leaves `len` untouched.
    #[test]
    fn prop_idempotent_delete(
        keys in prop::collection::hash_set(key_strategy(), 0..20),
        absent in key_strategy()
    ) {
        prop_assume!(!keys.contains(&absent));
        let cache: Cache<String> = test_cache();
        for key in &keys {
            cache.set(key.clone(), "v".to_string());
        }

        prop_assert!(!cache.delete(&absent));
        prop_assert!(!cache.delete(&absent));
        prop_assert_eq!(cache.len(), keys.len());
    }

    // Range visits each live key exactly once when nothing mutates the cache.
    #[test]
    fn prop_range_completeness(keys in prop::collection::hash_set(key_strategy(), 0..200)) {
        let cache: Cache<String> = test_cache();
        for key in &keys {
            cache.set_with_expire(key.clone(), key.clone(), NO_TTL);
        }

        let visits = AtomicUsize::new(0);
        let seen = Mutex::new(HashSet::new());
        cache.range(&CancellationToken::new(), |key, value, _| {
            visits.fetch_add(1, Ordering::Relaxed);
            assert_eq!(key, value);
            seen.lock().insert(key.to_string());
            true
        });

        prop_assert_eq!(visits.load(Ordering::Relaxed), keys.len());
        prop_assert_eq!(seen.into_inner(), keys);
    }

    // Write followed by Read into a fresh cache restores every pair.
    #[test]
    fn prop_snapshot_roundtrip(
        pairs in prop::collection::hash_map(key_strategy(), value_strategy(), 0..100)
    ) {
        let cache: Cache<String> = test_cache();
        for (key, value) in &pairs {
            cache.set_with_expire(key.clone(), value.clone(), NO_TTL);
        }

        let mut buf = Vec::new();
        cache.write_to(&CancellationToken::new(), &mut buf).unwrap();

        let restored: Cache<String> = test_cache();
        prop_assert_eq!(restored.read_from(buf.as_slice()).unwrap(), pairs.len());
        for (key, value) in &pairs {
            prop_assert_eq!(restored.get(key), Some(value.clone()));
        }
        prop_assert_eq!(restored.len(), pairs.len());
    }

    // Snapshots keep every float bit pattern, including infinities and NaN.
    #[test]
    fn prop_snapshot_roundtrip_floats(
        pairs in prop::collection::hash_map(key_strategy(), any::<f64>(), 0..50)
    ) {
        let cache: Cache<f64> = test_cache();
        for (key, value) in &pairs {
            cache.set_with_expire(key.clone(), *value, NO_TTL);
        }

        let mut buf = Vec::new();
        cache.write_to(&CancellationToken::new(), &mut buf).unwrap();
        let restored: Cache<f64> = test_cache();
        restored.read_from(buf.as_slice()).unwrap();

        for (key, value) in &pairs {
            prop_assert_eq!(restored.get(key).map(f64::to_bits), Some(value.to_bits()));
        }
    }

    // Nested options come back with their exact shape.
    #[test]
    fn prop_snapshot_roundtrip_nested_options(
        pairs in prop::collection::hash_map(key_strategy(), any::<Option<Option<u8>>>(), 0..50)
    ) {
        let cache: Cache<Option<Option<u8>>> = test_cache();
        for (key, value) in &pairs {
            cache.set_with_expire(key.clone(), *value, NO_TTL);
        }

        let mut buf = Vec::new();
        cache.write_to(&CancellationToken::new(), &mut buf).unwrap();
        let restored: Cache<Option<Option<u8>>> = test_cache();
        restored.read_from(buf.as_slice()).unwrap();

        for (key, value) in &pairs {
            prop_assert_eq!(restored.get(key), Some(*value));
        }
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // An entry is readable before its TTL elapses and gone afterwards.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in key_strategy(),
        value in value_strategy(),
        ttl_ms in 10u64..40
    ) {
        let cache: Cache<String> = test_cache();
        cache.set_with_expire(key.clone(), value.clone(), Duration::from_millis(ttl_ms));

        prop_assert_eq!(cache.get(&key), Some(value));

        sleep(Duration::from_millis(ttl_ms + 20));

        prop_assert!(cache.get(&key).is_none(), "Entry should be gone after TTL");
        prop_assert_eq!(cache.len(), 0);
    }
}
