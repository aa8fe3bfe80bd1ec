//! Eviction Deduplication Module
//!
//! Collapses concurrent evictions of the same key into a single run. The
//! first caller for a key leads; callers arriving while it runs block until
//! it finishes and share its result. Once the leader completes the key is
//! forgotten, so a later expiration of the same key starts a fresh run.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

// == Outcome ==
/// Result of an eviction as seen by one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the run removed an entry
    pub removed: bool,
    /// True when this caller waited on another caller's run
    pub shared: bool,
}

// == Flight ==
#[derive(Default)]
struct Flight {
    result: Mutex<Option<bool>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, removed: bool) {
        *self.result.lock() = Some(removed);
        self.done.notify_all();
    }

    fn wait(&self) -> bool {
        let mut result = self.result.lock();
        while result.is_none() {
            self.done.wait(&mut result);
        }
        (*result).unwrap_or(false)
    }
}

// == Eviction Group ==
/// In-flight eviction registry keyed by cache key.
#[derive(Default)]
pub struct EvictionGroup {
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
}

impl EvictionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `evict` for `key` unless a run for the same key is already in
    /// flight, in which case this call waits for that run instead.
    pub fn run<F>(&self, key: &str, evict: F) -> Outcome
    where
        F: FnOnce() -> bool,
    {
        let flight = {
            let mut in_flight = self.in_flight.lock();
            if let Some(flight) = in_flight.get(key) {
                Some(Arc::clone(flight))
            } else {
                in_flight.insert(key.to_string(), Arc::new(Flight::default()));
                None
            }
        };

        if let Some(flight) = flight {
            return Outcome {
                removed: flight.wait(),
                shared: true,
            };
        }

        let mut lead = Lead {
            group: self,
            key,
            removed: false,
        };
        lead.removed = evict();
        Outcome {
            removed: lead.removed,
            shared: false,
        }
    }

    /// Number of evictions currently running.
    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

// Releases waiters even if the eviction closure panics.
struct Lead<'a> {
    group: &'a EvictionGroup,
    key: &'a str,
    removed: bool,
}

impl Drop for Lead<'_> {
    fn drop(&mut self) {
        let flight = self.group.in_flight.lock().remove(self.key);
        if let Some(flight) = flight {
            flight.complete(self.removed);
        }
    }
}
