//! Cache Entry Module
//!
//! Defines a stored value together with its absolute expiration instant.

use std::time::Duration;

use chrono::Utc;

// == Cache Entry ==
/// A stored value plus its expiration timestamp.
///
/// `expire_at` is in Unix nanoseconds; `expire_at <= 0` means the entry never
/// expires. Entries are replaced whole, never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix nanoseconds), `<= 0` = no expiration
    pub expire_at: i64,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry expiring `ttl_nanos` after `now`.
    ///
    /// A non-positive `ttl_nanos` produces an entry that never expires.
    pub fn new(value: V, ttl_nanos: i64, now: i64) -> Self {
        let expire_at = if ttl_nanos > 0 {
            now.saturating_add(ttl_nanos)
        } else {
            0
        };
        Self { value, expire_at }
    }

    // == Is Valid ==
    /// Checks whether the entry is still live at `now`.
    ///
    /// Boundary condition: an entry is still valid when `now == expire_at`.
    pub fn is_valid(&self, now: i64) -> bool {
        self.expire_at <= 0 || now <= self.expire_at
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if the entry never expires.
    ///
    /// - `Some(Duration::ZERO)` once the entry has expired
    pub fn remaining(&self, now: i64) -> Option<Duration> {
        if self.expire_at <= 0 {
            return None;
        }
        let left = self.expire_at.saturating_sub(now).max(0);
        Some(Duration::from_nanos(left as u64))
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
