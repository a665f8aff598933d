// src/db.rs
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::APP_DIR;

const DB_FILE_NAME: &str = "revup.sqlite";
const DATA_ENV_VAR: &str = "REVUP_DATA_DIR";

// Custom Error type for storage operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
    #[error("Stored value under '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// Per-user key names. Values are JSON except the unit, which is the bare unit string.
pub mod keys {
    #[must_use]
    pub fn workouts(uid: &str) -> String {
        format!("workouts_{uid}")
    }
    #[must_use]
    pub fn templates(uid: &str) -> String {
        format!("templates_{uid}")
    }
    #[must_use]
    pub fn finished(uid: &str) -> String {
        format!("finishedWorkouts_{uid}")
    }
    #[must_use]
    pub fn unit(uid: &str) -> String {
        format!("unit_{uid}")
    }
    /// Every key owned by one user.
    #[must_use]
    pub fn all(uid: &str) -> [String; 4] {
        [workouts(uid), templates(uid), finished(uid), unit(uid)]
    }

    pub const ACCOUNTS: &str = "accounts";
    pub const AUTH_SESSION: &str = "auth_session";
}

/// Synchronous string key-value store. Everything the application persists goes through this.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&mut self, key: &str) -> Result<(), Error>;
    /// Writes all entries or none of them.
    fn set_many(&mut self, entries: &[(String, String)]) -> Result<(), Error>;
    /// Removes all keys or none of them.
    fn remove_many(&mut self, keys: &[String]) -> Result<(), Error>;
}

/// Reads and decodes a JSON value, `None` when the key is absent.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, Error> {
    store
        .get(key)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|source| Error::Corrupt {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

/// Encodes a value as JSON, ready for `set` or `set_many`.
pub fn to_json<T: serde::Serialize>(key: &str, value: &T) -> Result<(String, String), Error> {
    let raw = serde_json::to_string(value).map_err(|source| Error::Serialize {
        key: key.to_string(),
        source,
    })?;
    Ok((key.to_string(), raw))
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Exposed at crate root as `get_db_path_util`
pub fn get_db_path() -> Result<PathBuf, Error> {
    let app_dir = match std::env::var(DATA_ENV_VAR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::data_dir().ok_or(Error::DataDir)?.join(APP_DIR),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Key-value store in a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and initializes the table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(Error::Connection)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(Error::Connection)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

/// Initializes the database table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        )",
        [],
    )
    .map_err(Error::Connection)?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Error::QueryFailed)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(Error::UpdateFailed)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(Error::DeleteFailed)?;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(String, String)]) -> Result<(), Error> {
        let tx = self.conn.transaction().map_err(Error::Connection)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(Error::UpdateFailed)?;
        }
        // Dropping the transaction without commit rolls everything back.
        tx.commit().map_err(Error::UpdateFailed)
    }

    fn remove_many(&mut self, keys: &[String]) -> Result<(), Error> {
        let tx = self.conn.transaction().map_err(Error::Connection)?;
        for key in keys {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(Error::DeleteFailed)?;
        }
        tx.commit().map_err(Error::DeleteFailed)
    }
}

/// Store kept entirely in memory. Used by tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    fn set_many(&mut self, entries: &[(String, String)]) -> Result<(), Error> {
        for (key, value) in entries {
            self.entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&mut self, keys: &[String]) -> Result<(), Error> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}
