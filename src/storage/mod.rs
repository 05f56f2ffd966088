mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("unable to determine data directory")]
    DataDir,
}

/// String key-value storage. The session scope lives in memory; the device
/// scope survives restarts.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Stores `value` under `key` when both are non-empty, otherwise reads
/// `key`. Storage errors are logged and read as `None`.
pub fn data(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    match value.filter(|value| !value.is_empty()) {
        Some(value) => match store.set(key, value) {
            Ok(()) => Some(value.to_string()),
            Err(err) => {
                tracing::error!(target: "storage", key, error = %err, "failed to store data element");
                None
            }
        },
        None => store.get(key).unwrap_or_else(|err| {
            tracing::error!(target: "storage", key, error = %err, "failed to retrieve data element");
            None
        }),
    }
}

pub fn delete_data(store: &dyn KeyValueStore, key: &str) {
    if let Err(err) = store.remove(key) {
        tracing::error!(target: "storage", key, error = %err, "failed to remove data element");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_writes_then_reads() {
        let store = MemoryStore::new();
        assert_eq!(data(&store, "token", Some("abc")), Some("abc".to_string()));
        assert_eq!(data(&store, "token", None), Some("abc".to_string()));
        assert_eq!(data(&store, "token", Some("")), Some("abc".to_string()));
        assert_eq!(data(&store, "", Some("x")), None);

        delete_data(&store, "token");
        assert_eq!(data(&store, "token", None), None);
    }
}
