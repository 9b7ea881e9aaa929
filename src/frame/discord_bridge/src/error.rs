use bridge_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("store error: {0}")]
    Db(#[from] DbError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("invalid user id: {0}")]
    InvalidUserId(String),
    #[error("invalid content uri: {0}")]
    InvalidContentUri(String),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
