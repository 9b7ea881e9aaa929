use crate::avatar::{reupload_avatar, AvatarFetcher};
use crate::config::PuppetNaming;
use crate::error::BridgeResult;
use crate::ids::{ContentUri, UserId};
use crate::intent::{Appservice, Intent};
use crate::portal::{update_portal_meta, PortalDirectory, PuppetMetaUpdate};
use crate::remote::RemoteUser;
use crate::user::User;
use bridge_db::{PuppetRow, PuppetStore};
use log::*;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

/// Collaborators shared by every puppet of one bridge.
pub struct PuppetContext {
    pub naming: PuppetNaming,
    pub store: Arc<dyn PuppetStore>,
    pub appservice: Arc<dyn Appservice>,
    pub portals: Arc<dyn PortalDirectory>,
    pub avatars: Arc<dyn AvatarFetcher>,
}

/// The local ghost of one remote user.
///
/// Profile fields live in the wrapped row. `update_info` calls are
/// serialized by `sync_lock`; the row lock itself is only held for short
/// in-memory sections and store writes, never across a network call.
/// Every store write is made from the row while its lock is held, so the
/// stored row never goes back to a state older than memory.
pub struct Puppet {
    id: String,
    mxid: UserId,
    row: RwLock<PuppetRow>,
    custom_intent: RwLock<Option<Arc<dyn Intent>>>,
    sync_lock: Mutex<()>,
    ctx: Arc<PuppetContext>,
}

impl Puppet {
    pub(crate) fn new(ctx: Arc<PuppetContext>, row: PuppetRow) -> Self {
        let puppet = Puppet {
            id: row.id.clone(),
            mxid: ctx.naming.format_puppet_mxid(&row.id),
            row: RwLock::new(row),
            custom_intent: RwLock::new(None),
            sync_lock: Mutex::new(()),
            ctx,
        };
        puppet.refresh_custom_intent();
        puppet
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mxid(&self) -> &UserId {
        &self.mxid
    }

    pub fn displayname(&self) -> String {
        self.read_row().name.clone()
    }

    pub fn avatar_url(&self) -> ContentUri {
        let url = self.read_row().avatar_url.clone();
        ContentUri::parse(&url).unwrap_or_else(|err| {
            warn!("puppet {} has a bad stored avatar url: {}", self.id, err);
            ContentUri::empty()
        })
    }

    pub fn custom_mxid(&self) -> Option<UserId> {
        let claim = self.read_row().custom_mxid.clone()?;
        UserId::parse(&claim).ok()
    }

    pub fn snapshot(&self) -> PuppetRow {
        self.read_row().clone()
    }

    pub fn default_intent(&self) -> Arc<dyn Intent> {
        self.ctx.appservice.intent(&self.mxid)
    }

    /// Intent of the claiming account, when it has double puppeting set up.
    pub fn custom_intent(&self) -> Option<Arc<dyn Intent>> {
        self.custom_intent
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Intent to act with in a portal owned by `receiver` (empty for portals
    /// shared by everyone). The double puppet is only used in shared portals
    /// and in the claiming account's own ones.
    pub fn intent_for(&self, receiver: &str) -> Arc<dyn Intent> {
        match self.custom_intent() {
            Some(intent) if receiver.is_empty() || receiver == self.id => intent,
            _ => self.default_intent(),
        }
    }

    fn refresh_custom_intent(&self) {
        let intent = self
            .custom_mxid()
            .and_then(|claim| self.ctx.appservice.double_puppet_intent(&claim));
        *self
            .custom_intent
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = intent;
    }

    pub fn save(&self) -> BridgeResult<()> {
        let row = self.read_row();
        self.ctx.store.update(&row).map_err(|err| {
            error!("failed to save puppet {}: {}", self.id, err);
            err
        })?;
        Ok(())
    }

    /// Sets the claim and persists it in the same row critical section.
    /// On a store failure the previous claim is restored.
    pub(crate) fn save_custom_mxid(&self, claim: Option<String>) -> BridgeResult<()> {
        {
            let mut row = self.write_row();
            let previous = std::mem::replace(&mut row.custom_mxid, claim);
            if let Err(err) = self.ctx.store.update(&row) {
                error!("failed to save claim of puppet {}: {}", self.id, err);
                row.custom_mxid = previous;
                return Err(err.into());
            }
        }
        self.refresh_custom_intent();
        Ok(())
    }

    /// Brings the ghost profile in line with `info`, fetching the profile
    /// through `source` when `info` is missing or partial and nothing is
    /// known yet. Returns whether anything was changed and saved.
    ///
    /// Network and homeserver failures are logged and leave the matching
    /// `*_set` flag false so a later call retries. Only store failures are
    /// returned.
    pub async fn update_info(
        &self,
        source: Option<&User>,
        info: Option<&RemoteUser>,
    ) -> BridgeResult<bool> {
        let _sync = self.sync_lock.lock().await;

        let info = match info {
            Some(info) if info.has_required_fields() => info.clone(),
            _ => {
                if !self.read_row().name.is_empty() {
                    return Ok(false);
                }
                let Some(source) = source else {
                    return Ok(false);
                };
                debug!(
                    "fetching info of puppet {} through user {}",
                    self.id,
                    source.discord_id()
                );
                match source.session().fetch_user(&self.id).await {
                    Ok(info) => info,
                    Err(err) => {
                        error!(
                            "failed to fetch info of puppet {} through user {}: {}",
                            self.id,
                            source.discord_id(),
                            err
                        );
                        return Ok(false);
                    }
                }
            }
        };

        if let Err(err) = self.default_intent().ensure_registered().await {
            error!("failed to ensure puppet {} is registered: {}", self.mxid, err);
        }

        let mut changed = self.update_name(&info).await;
        changed = self.update_avatar(&info).await || changed;
        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    async fn update_name(&self, info: &RemoteUser) -> bool {
        let new_name = self.ctx.naming.format_displayname(info);
        {
            let mut row = self.write_row();
            if row.name == new_name && row.name_set {
                return false;
            }
            row.name = new_name.clone();
            row.name_set = false;
        }

        match self.default_intent().set_display_name(&new_name).await {
            Ok(()) => {
                self.write_row().name_set = true;
                self.propagate(PuppetMetaUpdate::Name(new_name));
            }
            Err(err) => warn!("failed to update displayname of puppet {}: {}", self.id, err),
        }
        true
    }

    async fn update_avatar(&self, info: &RemoteUser) -> bool {
        let (avatar_changed, mut url) = {
            let mut row = self.write_row();
            if row.avatar == info.avatar && row.avatar_set {
                return false;
            }
            let avatar_changed = row.avatar != info.avatar;
            // a failed profile write keeps the re-hosted copy of the same image
            let known = if avatar_changed {
                ContentUri::empty()
            } else {
                ContentUri::parse(&row.avatar_url).unwrap_or_default()
            };
            row.avatar = info.avatar.clone();
            row.avatar_set = false;
            row.avatar_url = known.to_string();
            (avatar_changed, known)
        };

        let intent = self.default_intent();
        if !info.avatar.is_empty() && (url.is_empty() || avatar_changed) {
            match reupload_avatar(intent.as_ref(), self.ctx.avatars.as_ref(), &info.avatar_url())
                .await
            {
                Ok(uploaded) => {
                    self.write_row().avatar_url = uploaded.to_string();
                    url = uploaded;
                }
                Err(err) => {
                    warn!(
                        "failed to reupload avatar {} of puppet {}: {}",
                        info.avatar, self.id, err
                    );
                    return true;
                }
            }
        }

        match intent.set_avatar_url(&url).await {
            Ok(()) => {
                self.write_row().avatar_set = true;
                self.propagate(PuppetMetaUpdate::Avatar {
                    avatar_id: info.avatar.clone(),
                    avatar_url: url,
                });
            }
            Err(err) => warn!("failed to update avatar of puppet {}: {}", self.id, err),
        }
        true
    }

    fn propagate(&self, update: PuppetMetaUpdate) {
        tokio::spawn(update_portal_meta(
            self.ctx.portals.clone(),
            self.id.clone(),
            update,
        ));
    }

    fn read_row(&self) -> RwLockReadGuard<'_, PuppetRow> {
        self.row.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_row(&self) -> RwLockWriteGuard<'_, PuppetRow> {
        self.row.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
