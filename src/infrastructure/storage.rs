use crate::infrastructure::error::ClientError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), ClientError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// String key/value storage that outlives the process.
pub trait LocalStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove_item(&self, key: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLocalStore {
    db_path: PathBuf,
}

impl SqliteLocalStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, ClientError> {
        Connection::open(&self.db_path).map_err(ClientError::from)
    }
}

impl LocalStore for SqliteLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError> {
        let connection = self.connect()?;
        let value = connection
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO local_storage (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), ClientError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryLocalStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ClientError> {
        self.items
            .lock()
            .map_err(|error| ClientError::Credential(format!("local store lock poisoned: {error}")))
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), ClientError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_store_upserts_and_removes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("state.sqlite");
        initialize_database(&db_path).expect("init db");

        let store = SqliteLocalStore::new(&db_path);
        assert_eq!(store.get_item("todoAppToken").expect("get"), None);

        store.set_item("todoAppToken", "first").expect("set");
        store.set_item("todoAppToken", "second").expect("overwrite");
        assert_eq!(
            store.get_item("todoAppToken").expect("get"),
            Some("second".to_string())
        );

        store.remove_item("todoAppToken").expect("remove");
        store.remove_item("todoAppToken").expect("remove twice");
        assert_eq!(store.get_item("todoAppToken").expect("get"), None);
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("state.sqlite");
        initialize_database(&db_path).expect("init db");
        SqliteLocalStore::new(&db_path)
            .set_item("prohibitedWords", "[\"spam\"]")
            .expect("set");

        initialize_database(&db_path).expect("re-init is idempotent");
        let reopened = SqliteLocalStore::new(&db_path);
        assert_eq!(
            reopened.get_item("prohibitedWords").expect("get"),
            Some("[\"spam\"]".to_string())
        );
    }

    #[test]
    fn in_memory_store_roundtrip() {
        let store = InMemoryLocalStore::default();
        store.set_item("k", "v").expect("set");
        assert_eq!(store.get_item("k").expect("get"), Some("v".to_string()));
        store.remove_item("k").expect("remove");
        assert_eq!(store.get_item("k").expect("get"), None);
    }
}
