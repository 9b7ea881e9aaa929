use crate::error::{BridgeError, BridgeResult};
use crate::ids::UserId;
use crate::puppet::{Puppet, PuppetContext};
use bridge_db::{PuppetFilter, PuppetRow};
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct PuppetIndex {
    by_id: HashMap<String, Arc<Puppet>>,
    by_custom_mxid: HashMap<UserId, Arc<Puppet>>,
}

impl PuppetIndex {
    // reuses the resident puppet for the row id, so both maps always share one object
    fn adopt(&mut self, ctx: &Arc<PuppetContext>, row: PuppetRow) -> Arc<Puppet> {
        if let Some(puppet) = self.by_id.get(&row.id) {
            return puppet.clone();
        }

        let puppet = Arc::new(Puppet::new(ctx.clone(), row));
        self.by_id.insert(puppet.id().to_string(), puppet.clone());
        if let Some(claim) = puppet.custom_mxid() {
            self.by_custom_mxid.insert(claim, puppet.clone());
        }
        puppet
    }
}

/// Process wide directory of puppets, keyed by remote id and by the local
/// account that claimed the puppet.
///
/// One lock covers both maps and is held across the store round trip of a
/// get-or-create, so at most one `Puppet` exists per remote id. Nothing in
/// here awaits.
pub struct PuppetRegistry {
    ctx: Arc<PuppetContext>,
    index: Mutex<PuppetIndex>,
}

impl PuppetRegistry {
    pub fn new(ctx: Arc<PuppetContext>) -> Self {
        PuppetRegistry {
            ctx,
            index: Mutex::new(PuppetIndex::default()),
        }
    }

    pub fn context(&self) -> &Arc<PuppetContext> {
        &self.ctx
    }

    fn lock_index(&self) -> BridgeResult<MutexGuard<'_, PuppetIndex>> {
        self.index
            .lock()
            .map_err(|_| BridgeError::LockPoisoned("puppet directory"))
    }

    /// Returns the puppet for `id`, creating and persisting an empty row
    /// the first time the id is seen.
    pub fn get_by_id(&self, id: &str) -> BridgeResult<Arc<Puppet>> {
        let mut index = self.lock_index()?;
        if let Some(puppet) = index.by_id.get(id) {
            return Ok(puppet.clone());
        }

        let row = match self.ctx.store.get(id).map_err(|err| {
            error!("failed to load puppet {}: {}", id, err);
            err
        })? {
            Some(row) => row,
            None => {
                let row = PuppetRow::new(id);
                self.ctx.store.insert(&row).map_err(|err| {
                    error!("failed to insert puppet {}: {}", id, err);
                    err
                })?;
                debug!("created puppet {}", id);
                row
            }
        };

        Ok(index.adopt(&self.ctx, row))
    }

    /// Looks up a ghost by its Matrix id. Ids that are not ghosts yield `None`.
    pub fn get_by_mxid(&self, mxid: &UserId) -> BridgeResult<Option<Arc<Puppet>>> {
        match self.ctx.naming.parse_puppet_mxid(mxid) {
            Some(id) => Ok(Some(self.get_by_id(&id)?)),
            None => Ok(None),
        }
    }

    /// Finds the puppet claimed by `mxid`. Never creates one.
    pub fn get_by_custom_mxid(&self, mxid: &UserId) -> BridgeResult<Option<Arc<Puppet>>> {
        let mut index = self.lock_index()?;
        if let Some(puppet) = index.by_custom_mxid.get(mxid) {
            return Ok(Some(puppet.clone()));
        }

        let row = self
            .ctx
            .store
            .get_by_custom_mxid(&mxid.to_string())
            .map_err(|err| {
                error!("failed to load puppet claimed by {}: {}", mxid, err);
                err
            })?;
        let Some(row) = row else {
            return Ok(None);
        };

        let puppet = index.adopt(&self.ctx, row);
        index.by_custom_mxid.insert(mxid.clone(), puppet.clone());
        Ok(Some(puppet))
    }

    /// Turns stored rows into puppets, reusing resident ones. `None` entries
    /// stay `None` at the same position.
    pub fn hydrate(&self, rows: Vec<Option<PuppetRow>>) -> BridgeResult<Vec<Option<Arc<Puppet>>>> {
        let mut index = self.lock_index()?;
        Ok(rows
            .into_iter()
            .map(|row| row.map(|row| index.adopt(&self.ctx, row)))
            .collect())
    }

    pub fn get_all(&self) -> BridgeResult<Vec<Arc<Puppet>>> {
        self.load_filtered(PuppetFilter::All)
    }

    pub fn get_all_with_custom_mxid(&self) -> BridgeResult<Vec<Arc<Puppet>>> {
        self.load_filtered(PuppetFilter::WithCustomMxid)
    }

    fn load_filtered(&self, filter: PuppetFilter) -> BridgeResult<Vec<Arc<Puppet>>> {
        let rows = self.ctx.store.get_all(filter).map_err(|err| {
            error!("failed to scan puppets ({:?}): {}", filter, err);
            err
        })?;
        let puppets = self.hydrate(rows.into_iter().map(Some).collect())?;
        Ok(puppets.into_iter().flatten().collect())
    }

    /// Claims `puppet` for a local account, or releases the claim with `None`.
    pub fn set_custom_mxid(&self, puppet: &Arc<Puppet>, claim: Option<UserId>) -> BridgeResult<()> {
        let mut index = self.lock_index()?;
        let previous = puppet.custom_mxid();
        if previous == claim {
            return Ok(());
        }

        puppet.save_custom_mxid(claim.as_ref().map(|mxid| mxid.to_string()))?;

        if let Some(previous) = previous {
            index.by_custom_mxid.remove(&previous);
        }
        index
            .by_id
            .entry(puppet.id().to_string())
            .or_insert_with(|| puppet.clone());
        if let Some(claim) = claim {
            info!("puppet {} claimed by {}", puppet.id(), claim);
            index.by_custom_mxid.insert(claim, puppet.clone());
        } else {
            info!("puppet {} released", puppet.id());
        }
        Ok(())
    }
}
