use crate::error::BridgeResult;
use crate::ids::UserId;
use crate::remote::RemoteSession;
use crate::state::SessionState;
use bridge_db::{UserRow, UserStore};
use log::*;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A local account together with its remote login.
pub struct User {
    mxid: UserId,
    row: RwLock<UserRow>,
    session: Arc<dyn RemoteSession>,
    state: Arc<SessionState>,
    enable_dm_bridging: bool,
    store: Arc<dyn UserStore>,
}

impl User {
    pub fn new(
        row: UserRow,
        session: Arc<dyn RemoteSession>,
        state: Arc<SessionState>,
        enable_dm_bridging: bool,
        store: Arc<dyn UserStore>,
    ) -> BridgeResult<Self> {
        Ok(User {
            mxid: UserId::parse(&row.mxid)?,
            row: RwLock::new(row),
            session,
            state,
            enable_dm_bridging,
            store,
        })
    }

    pub fn mxid(&self) -> &UserId {
        &self.mxid
    }

    pub fn discord_id(&self) -> String {
        self.read_row().discord_id.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        !self.read_row().discord_token.is_empty()
    }

    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn enable_dm_bridging(&self) -> bool {
        self.enable_dm_bridging
    }

    pub fn snapshot(&self) -> UserRow {
        self.read_row().clone()
    }

    pub fn read_state_version(&self) -> i64 {
        self.read_row().read_state_version
    }

    /// Records the remote login of this account.
    pub fn set_login(&self, discord_id: &str, token: &str) {
        let mut row = self.write_row();
        row.discord_id = discord_id.to_string();
        row.discord_token = token.to_string();
    }

    /// Advances the read state version. Older or equal versions are ignored,
    /// returns whether the stored value moved.
    pub fn set_read_state_version(&self, version: i64) -> bool {
        let mut row = self.write_row();
        if version <= row.read_state_version {
            return false;
        }
        row.read_state_version = version;
        true
    }

    pub fn save(&self) -> BridgeResult<()> {
        let row = self.snapshot();
        self.store.update_user(&row).map_err(|err| {
            error!("failed to save user {}: {}", self.mxid, err);
            err
        })?;
        Ok(())
    }

    fn read_row(&self) -> RwLockReadGuard<'_, UserRow> {
        self.row.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_row(&self) -> RwLockWriteGuard<'_, UserRow> {
        self.row.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
