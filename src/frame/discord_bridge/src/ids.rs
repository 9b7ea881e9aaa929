use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully qualified Matrix user id, `@localpart:server`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId {
    localpart: String,
    server: String,
}

impl UserId {
    pub fn new(localpart: &str, server: &str) -> Self {
        UserId {
            localpart: localpart.to_string(),
            server: server.to_string(),
        }
    }

    pub fn parse(value: &str) -> BridgeResult<Self> {
        let rest = value
            .strip_prefix('@')
            .ok_or_else(|| BridgeError::InvalidUserId(value.to_string()))?;
        let (localpart, server) = rest
            .split_once(':')
            .ok_or_else(|| BridgeError::InvalidUserId(value.to_string()))?;
        if localpart.is_empty() || server.is_empty() {
            return Err(BridgeError::InvalidUserId(value.to_string()));
        }
        Ok(UserId::new(localpart, server))
    }

    pub fn localpart(&self) -> &str {
        &self.localpart
    }

    pub fn homeserver(&self) -> &str {
        &self.server
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{}", self.localpart, self.server)
    }
}

impl TryFrom<String> for UserId {
    type Error = BridgeError;

    fn try_from(value: String) -> BridgeResult<Self> {
        UserId::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.to_string()
    }
}

/// An `mxc://server/media` reference. The empty value means "no media".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContentUri {
    server: String,
    media_id: String,
}

impl ContentUri {
    pub fn new(server: &str, media_id: &str) -> Self {
        ContentUri {
            server: server.to_string(),
            media_id: media_id.to_string(),
        }
    }

    pub fn empty() -> Self {
        ContentUri::default()
    }

    /// Parses a stored reference. The empty string parses to the empty uri.
    pub fn parse(value: &str) -> BridgeResult<Self> {
        if value.is_empty() {
            return Ok(ContentUri::empty());
        }
        let rest = value
            .strip_prefix("mxc://")
            .ok_or_else(|| BridgeError::InvalidContentUri(value.to_string()))?;
        match rest.split_once('/') {
            Some((server, media_id))
                if !server.is_empty() && !media_id.is_empty() && !media_id.contains('/') =>
            {
                Ok(ContentUri::new(server, media_id))
            }
            _ => Err(BridgeError::InvalidContentUri(value.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty() && self.media_id.is_empty()
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "mxc://{}/{}", self.server, self.media_id)
    }
}
