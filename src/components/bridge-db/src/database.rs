use crate::{DbError, DbResult};
use bridge_kit::get_bridge_data_dir;
use log::*;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_DB_FILE_NAME: &str = "discord-bridge.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS puppet (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL DEFAULT '',
    name_set    INTEGER NOT NULL DEFAULT 0,
    avatar      TEXT NOT NULL DEFAULT '',
    avatar_set  INTEGER NOT NULL DEFAULT 0,
    avatar_url  TEXT NOT NULL DEFAULT '',
    custom_mxid TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS "user" (
    mxid               TEXT PRIMARY KEY,
    dcid               TEXT UNIQUE,
    discord_token      TEXT,
    management_room    TEXT,
    space_room         TEXT,
    dm_space_room      TEXT,
    read_state_version INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_puppet_custom_mxid ON puppet (custom_mxid);
"#;

/// SQLite backed store for puppet and user rows.
///
/// All statements go through one connection guarded by a mutex, so every
/// row read or write is atomic with respect to other callers.
pub struct Database {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let db = Database {
            path: Some(path),
            conn: Mutex::new(conn),
        };
        db.init_db()?;
        Ok(db)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let db = Database {
            path: None,
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_db()?;
        Ok(db)
    }

    pub fn open_default() -> DbResult<Self> {
        Self::open(get_bridge_data_dir().join(DEFAULT_DB_FILE_NAME))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_db(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        match &self.path {
            Some(path) => info!("bridge database ready at {}", path.display()),
            None => debug!("in-memory bridge database ready"),
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }
}
