use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Local persistence seam: a flat string-to-string map.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobboard") {
            proj_dirs.data_dir().join("jobboard.db")
        } else {
            PathBuf::from("jobboard.db")
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

}

/// Opens and initializes the database at `path` (or the default location).
/// If either step fails, logs a warning and hands back session-only storage.
pub fn open_storage(path: Option<&Path>) -> Box<dyn KeyValueStore> {
    let opened = Database::open(path).and_then(|db| {
        db.init()
            .with_context(|| format!("Failed to initialize storage at {}", db.path().display()))?;
        Ok(db)
    });
    match opened {
        Ok(db) => {
            debug!(path = %db.path().display(), "Using local storage");
            Box::new(db)
        }
        Err(e) => {
            warn!("Local storage unavailable, changes will not be kept: {e:#}");
            Box::new(MemoryStorage::new())
        }
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key '{}'", key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key '{}'", key))?;
        Ok(())
    }
}

/// Session-only storage. Also the fallback when the database is unusable.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_get_set_overwrites() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("savedJobs").unwrap(), None);

        db.set("savedJobs", "[\"1\"]").unwrap();
        assert_eq!(db.get("savedJobs").unwrap().as_deref(), Some("[\"1\"]"));

        db.set("savedJobs", "[]").unwrap();
        assert_eq!(db.get("savedJobs").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_database_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("board.db");

        {
            let mut db = Database::open(Some(path.as_path())).unwrap();
            db.init().unwrap();
            db.set("appliedJobs", "[]").unwrap();
        }

        let db = Database::open(Some(path.as_path())).unwrap();
        db.init().unwrap();
        assert_eq!(db.get("appliedJobs").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_open_storage_initializes_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");

        {
            let mut storage = open_storage(Some(path.as_path()));
            assert_eq!(storage.get("savedJobs").unwrap(), None);
            storage.set("savedJobs", "[\"4\"]").unwrap();
        }

        assert!(path.exists());
        let storage = open_storage(Some(path.as_path()));
        assert_eq!(storage.get("savedJobs").unwrap().as_deref(), Some("[\"4\"]"));
    }

    #[test]
    fn test_open_storage_falls_back_when_path_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("board.db");

        let mut storage = open_storage(Some(path.as_path()));
        storage.set("savedJobs", "[\"1\"]").unwrap();
        assert_eq!(storage.get("savedJobs").unwrap().as_deref(), Some("[\"1\"]"));
        assert!(!path.exists());
    }

    #[test]
    fn test_open_storage_falls_back_when_file_is_not_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();

        let mut storage = open_storage(Some(path.as_path()));
        storage.set("appliedJobs", "[]").unwrap();
        assert_eq!(storage.get("appliedJobs").unwrap().as_deref(), Some("[]"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xAB; 4096]);
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }
}
