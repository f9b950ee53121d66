//! Keyed record store.
//!
//! # Responsibilities
//! - Hold one kind of record keyed by its id
//! - Build records from raw JSON and cache them

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;

/// A record that can live in a [`Store`].
pub trait Record: DeserializeOwned + Send + Sync + 'static {
    /// Name used in logs and decode errors.
    const KIND: &'static str;

    /// Key of the record inside its store.
    fn id(&self) -> &str;
}

/// Concurrent map of records of one kind.
#[derive(Debug)]
pub struct Store<T> {
    records: DashMap<String, Arc<T>>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<T: Record> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a record with this id is cached.
    pub fn has(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Get a cached record by id.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.records.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert a record, replacing any record with the same id.
    pub fn set(&self, record: Arc<T>) -> Arc<T> {
        self.records
            .insert(record.id().to_string(), Arc::clone(&record));
        record
    }

    /// Decode `raw` into a record and cache it.
    pub fn factory(&self, raw: Value) -> Result<Arc<T>, DecodeError> {
        let record: T = serde_json::from_value(raw).map_err(|e| DecodeError::new(T::KIND, &e))?;
        tracing::trace!(kind = T::KIND, id = record.id(), "Caching record");
        Ok(self.set(Arc::new(record)))
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
