use crate::{str_or_null, Database, DbResult};
use log::*;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const PUPPET_COLUMNS: &str = "id, name, name_set, avatar, avatar_set, avatar_url, custom_mxid";

/// Persisted state of one remote user's ghost.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuppetRow {
    pub id: String,
    pub name: String,
    pub name_set: bool,
    pub avatar: String,
    pub avatar_set: bool,
    pub avatar_url: String,
    pub custom_mxid: Option<String>,
}

impl PuppetRow {
    pub fn new(id: &str) -> Self {
        PuppetRow {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn scan(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PuppetRow {
            id: row.get(0)?,
            name: row.get(1)?,
            name_set: row.get(2)?,
            avatar: row.get(3)?,
            avatar_set: row.get(4)?,
            avatar_url: row.get(5)?,
            custom_mxid: row.get::<_, Option<String>>(6)?.filter(|mxid| !mxid.is_empty()),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PuppetFilter {
    All,
    WithCustomMxid,
}

/// Row access used by the puppet directory. "No row" is `Ok(None)`, every
/// other failure is an error the caller must not paper over.
pub trait PuppetStore: Send + Sync {
    fn get(&self, id: &str) -> DbResult<Option<PuppetRow>>;
    fn get_by_custom_mxid(&self, mxid: &str) -> DbResult<Option<PuppetRow>>;
    fn get_all(&self, filter: PuppetFilter) -> DbResult<Vec<PuppetRow>>;
    fn insert(&self, puppet: &PuppetRow) -> DbResult<()>;
    fn update(&self, puppet: &PuppetRow) -> DbResult<()>;
}

impl PuppetStore for Database {
    fn get(&self, id: &str) -> DbResult<Option<PuppetRow>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM puppet WHERE id = ?1", PUPPET_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], PuppetRow::scan)
            .optional()?;
        Ok(row)
    }

    fn get_by_custom_mxid(&self, mxid: &str) -> DbResult<Option<PuppetRow>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM puppet WHERE custom_mxid = ?1", PUPPET_COLUMNS);
        let row = conn
            .query_row(&sql, params![mxid], PuppetRow::scan)
            .optional()?;
        Ok(row)
    }

    fn get_all(&self, filter: PuppetFilter) -> DbResult<Vec<PuppetRow>> {
        let conn = self.conn()?;
        let sql = match filter {
            PuppetFilter::All => format!("SELECT {} FROM puppet", PUPPET_COLUMNS),
            PuppetFilter::WithCustomMxid => format!(
                "SELECT {} FROM puppet WHERE custom_mxid IS NOT NULL AND custom_mxid <> ''",
                PUPPET_COLUMNS
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], PuppetRow::scan)?;

        let mut puppets = Vec::new();
        for row in rows {
            puppets.push(row?);
        }
        Ok(puppets)
    }

    fn insert(&self, puppet: &PuppetRow) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO puppet (id, name, name_set, avatar, avatar_set, avatar_url, custom_mxid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                puppet.id,
                puppet.name,
                puppet.name_set,
                puppet.avatar,
                puppet.avatar_set,
                puppet.avatar_url,
                puppet.custom_mxid.as_deref().and_then(str_or_null),
            ],
        )
        .map_err(|err| {
            warn!("failed to insert puppet {}: {}", puppet.id, err);
            err
        })?;
        Ok(())
    }

    fn update(&self, puppet: &PuppetRow) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE puppet SET name = ?1, name_set = ?2, avatar = ?3, avatar_set = ?4,
                avatar_url = ?5, custom_mxid = ?6
             WHERE id = ?7",
            params![
                puppet.name,
                puppet.name_set,
                puppet.avatar,
                puppet.avatar_set,
                puppet.avatar_url,
                puppet.custom_mxid.as_deref().and_then(str_or_null),
                puppet.id,
            ],
        )
        .map_err(|err| {
            warn!("failed to update puppet {}: {}", puppet.id, err);
            err
        })?;
        Ok(())
    }
}
