mod database;
mod puppet;
mod user;

pub use database::*;
pub use puppet::*;
pub use user::*;

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("DB Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO Error: {0}")]
    IOError(#[from] io::Error),
    #[error("database connection lock poisoned")]
    LockPoisoned,
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

// empty strings are stored as NULL so "unset" has one representation on disk
pub(crate) fn str_or_null(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
