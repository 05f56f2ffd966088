use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

use super::{KeyValueStore, StorageError};

/// Device-scoped store backed by sqlite.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

#[derive(Debug)]
struct SqliteCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for SqliteCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(1))
    }
}

impl SqliteStore {
    /// Opens the store under `ATVKIT_DATA_DIR`, or the platform data
    /// directory when unset.
    pub fn new() -> Result<Self, StorageError> {
        Self::open(&database_path()?)
    }

    pub fn new_with_path(dir: &Path) -> Result<Self, StorageError> {
        Self::open(&dir.join("device.sqlite3"))
    }

    fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| StorageError::DataDir)?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(4)
            .connection_customizer(Box::new(SqliteCustomizer))
            .build(manager)?;

        let conn = pool.get()?;
        initialise_schema(&conn)?;
        tracing::debug!(target: "storage", path = %path.display(), "opened device store");

        Ok(Self { pool })
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT value FROM entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, unix_timestamp()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }
}

fn database_path() -> Result<PathBuf, StorageError> {
    if let Ok(dir) = std::env::var("ATVKIT_DATA_DIR") {
        let mut path = PathBuf::from(dir);
        path.push("device.sqlite3");
        return Ok(path);
    }

    if let Some(dirs) = ProjectDirs::from("tv", "Atvkit", "atvkit") {
        let mut data_dir = dirs.data_dir().to_path_buf();
        data_dir.push("device.sqlite3");
        Ok(data_dir)
    } else {
        Err(StorageError::DataDir)
    }
}

fn initialise_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        CREATE TABLE IF NOT EXISTS entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopening() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::new_with_path(dir.path()).unwrap();
            store.set("itms-link", "itms://example").unwrap();
            store.set("volume", "3").unwrap();
            store.set("volume", "4").unwrap();
        }
        let store = SqliteStore::new_with_path(dir.path()).unwrap();
        assert_eq!(store.get("itms-link").unwrap().as_deref(), Some("itms://example"));
        assert_eq!(store.get("volume").unwrap().as_deref(), Some("4"));
        assert_eq!(store.keys().unwrap(), vec!["itms-link", "volume"]);
    }

    #[test]
    fn remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new_with_path(dir.path()).unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
