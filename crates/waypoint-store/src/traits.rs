//! The keyed-store collaborator interface.
//!
//! Plans, rules, and memories are all persisted through `KeyedStore`. The
//! core never sees the backing technology; a store only has to present a
//! consistent success-or-error contract for each call.

use serde::{de::DeserializeOwned, Serialize};

use waypoint_contracts::error::{WaypointError, WaypointResult};

use crate::record::StoredRecord;

/// A partition/sort keyed record store.
pub trait KeyedStore: Send + Sync {
    /// Fetch one record, or `None` if the key is absent.
    fn get(&self, partition_key: &str, sort_key: &str) -> WaypointResult<Option<StoredRecord>>;

    /// Insert or replace a record.
    fn put(&self, record: StoredRecord) -> WaypointResult<()>;

    /// All records in a partition whose sort key starts with `sort_prefix`,
    /// in insertion order. Replacing a record keeps its original position.
    fn query(
        &self,
        partition_key: &str,
        sort_prefix: Option<&str>,
    ) -> WaypointResult<Vec<StoredRecord>>;

    /// Replace an existing record. Fails with `NotFound` when the key is absent.
    fn update(&self, record: StoredRecord) -> WaypointResult<()>;

    /// Remove a record. Returns whether anything was removed.
    fn delete(&self, partition_key: &str, sort_key: &str) -> WaypointResult<bool>;
}

/// Typed JSON helpers over any `KeyedStore`, including trait objects.
pub trait KeyedStoreExt: KeyedStore {
    fn get_json<T: DeserializeOwned>(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> WaypointResult<Option<T>> {
        self.get(partition_key, sort_key)?
            .map(|record| decode(&record))
            .transpose()
    }

    fn put_json<T: Serialize>(
        &self,
        partition_key: &str,
        sort_key: &str,
        value: &T,
    ) -> WaypointResult<()> {
        self.put(StoredRecord::new(partition_key, sort_key, encode(value)?))
    }

    fn update_json<T: Serialize>(
        &self,
        partition_key: &str,
        sort_key: &str,
        value: &T,
    ) -> WaypointResult<()> {
        self.update(StoredRecord::new(partition_key, sort_key, encode(value)?))
    }

    fn query_json<T: DeserializeOwned>(
        &self,
        partition_key: &str,
        sort_prefix: Option<&str>,
    ) -> WaypointResult<Vec<T>> {
        self.query(partition_key, sort_prefix)?
            .iter()
            .map(decode)
            .collect()
    }
}

impl<S: KeyedStore + ?Sized> KeyedStoreExt for S {}

fn encode<T: Serialize>(value: &T) -> WaypointResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| WaypointError::Persistence {
        reason: format!("failed to encode record: {}", e),
    })
}

fn decode<T: DeserializeOwned>(record: &StoredRecord) -> WaypointResult<T> {
    serde_json::from_value(record.body.clone()).map_err(|e| WaypointError::Persistence {
        reason: format!(
            "failed to decode record '{}/{}': {}",
            record.partition_key, record.sort_key, e
        ),
    })
}
