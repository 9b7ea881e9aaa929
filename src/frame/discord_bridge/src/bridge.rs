use crate::avatar::AvatarFetcher;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::ids::UserId;
use crate::intent::Appservice;
use crate::portal::PortalDirectory;
use crate::puppet::PuppetContext;
use crate::puppet_registry::PuppetRegistry;
use crate::remote::RemoteSession;
use crate::state::SessionState;
use crate::user::User;
use bridge_db::{Database, UserRow, UserStore};
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Runtime root of the bridge: config, store, puppets and loaded users.
pub struct DiscordBridge {
    config: BridgeConfig,
    db: Arc<Database>,
    puppets: PuppetRegistry,
    users: Mutex<HashMap<UserId, Arc<User>>>,
}

impl DiscordBridge {
    pub fn new(
        config: BridgeConfig,
        db: Arc<Database>,
        appservice: Arc<dyn Appservice>,
        portals: Arc<dyn PortalDirectory>,
        avatars: Arc<dyn AvatarFetcher>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        let ctx = Arc::new(PuppetContext {
            naming: config.puppet_naming()?,
            store: db.clone(),
            appservice,
            portals,
            avatars,
        });

        Ok(DiscordBridge {
            config,
            db,
            puppets: PuppetRegistry::new(ctx),
            users: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn puppets(&self) -> &PuppetRegistry {
        &self.puppets
    }

    /// Loads every claimed puppet so double puppets resolve without a store
    /// round trip. Returns how many were loaded.
    pub fn start(&self) -> BridgeResult<usize> {
        let claimed = self.puppets.get_all_with_custom_mxid()?;
        info!("bridge started, {} claimed puppets loaded", claimed.len());
        Ok(claimed.len())
    }

    /// Returns the loaded user for `mxid`, reading or creating its row.
    pub fn load_user(
        &self,
        mxid: &UserId,
        session: Arc<dyn RemoteSession>,
        state: Arc<SessionState>,
    ) -> BridgeResult<Arc<User>> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| BridgeError::LockPoisoned("user cache"))?;
        if let Some(user) = users.get(mxid) {
            return Ok(user.clone());
        }

        let key = mxid.to_string();
        let row = match self.db.get_user_by_mxid(&key)? {
            Some(row) => row,
            None => {
                let row = UserRow::new(&key);
                self.db.insert_user(&row)?;
                debug!("created user {}", key);
                row
            }
        };

        let user = Arc::new(User::new(
            row,
            session,
            state,
            self.config.bridge.enable_dm_bridging,
            self.db.clone(),
        )?);
        users.insert(mxid.clone(), user.clone());
        Ok(user)
    }

    pub fn get_cached_user(&self, mxid: &UserId) -> Option<Arc<User>> {
        let users = self.users.lock().ok()?;
        users.get(mxid).cloned()
    }
}
