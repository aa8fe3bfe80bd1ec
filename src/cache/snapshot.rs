//! Snapshot Persistence Module
//!
//! Whole-table persistence: every live entry is written as one bincode
//! encoded map from key to value. Expiration metadata is not stored; entries
//! read back receive the cache's current default TTL.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::Cache;
use crate::error::Result;

impl<V: Clone + Send + Sync> Cache<V> {
    // == Write ==
    /// Serializes every live entry to `writer` as a single map.
    ///
    /// Entries that expire or change while the snapshot is taken may or may
    /// not be included.
    ///
    /// # Arguments
    /// * `token` - Cancels the underlying range; a cancelled token yields a
    ///   partial snapshot
    /// * `writer` - Destination of the encoded snapshot, buffered internally
    ///
    /// # Returns
    /// - `Err(CacheError::Serialization)` if a value cannot be encoded
    /// - `Err(CacheError::Io)` if the writer cannot be flushed
    pub fn write_to<W: Write>(&self, token: &CancellationToken, writer: W) -> Result<()>
    where
        V: Serialize,
    {
        let snapshot = self.to_raw_map(token);
        let mut writer = BufWriter::new(writer);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
        debug!("Snapshot written with {} entries", snapshot.len());
        Ok(())
    }

    // == Read ==
    /// Loads a snapshot produced by [`Cache::write_to`], storing every pair
    /// with the current default TTL.
    ///
    /// Nothing is stored if the snapshot cannot be decoded.
    ///
    /// # Arguments
    /// * `reader` - Source of the encoded snapshot, buffered internally
    ///
    /// # Returns
    /// The number of entries loaded, or `Err(CacheError::Serialization)` for a
    /// truncated or corrupt source.
    pub fn read_from<R: Read>(&self, reader: R) -> Result<usize>
    where
        V: DeserializeOwned,
    {
        let snapshot: HashMap<String, V> = bincode::deserialize_from(BufReader::new(reader))?;
        let loaded = snapshot.len();
        for (key, value) in snapshot {
            self.set(key, value);
        }
        debug!("Snapshot read with {} entries", loaded);
        Ok(loaded)
    }
}
