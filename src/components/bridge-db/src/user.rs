use crate::{str_or_null, Database, DbResult};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const USER_COLUMNS: &str =
    "mxid, dcid, discord_token, management_room, space_room, dm_space_room, read_state_version";

/// A local account that logged into the remote service through the bridge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub mxid: String,
    pub discord_id: String,
    pub discord_token: String,
    pub management_room: String,
    pub space_room: String,
    pub dm_space_room: String,
    pub read_state_version: i64,
}

impl UserRow {
    pub fn new(mxid: &str) -> Self {
        UserRow {
            mxid: mxid.to_string(),
            ..Default::default()
        }
    }

    fn scan(row: &Row<'_>) -> rusqlite::Result<Self> {
        let text = |idx: usize| -> rusqlite::Result<String> {
            Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
        };
        Ok(UserRow {
            mxid: row.get(0)?,
            discord_id: text(1)?,
            discord_token: text(2)?,
            management_room: text(3)?,
            space_room: text(4)?,
            dm_space_room: text(5)?,
            read_state_version: row.get(6)?,
        })
    }
}

pub trait UserStore: Send + Sync {
    fn get_user_by_mxid(&self, mxid: &str) -> DbResult<Option<UserRow>>;
    fn get_user_by_id(&self, discord_id: &str) -> DbResult<Option<UserRow>>;
    fn get_all_users_with_token(&self) -> DbResult<Vec<UserRow>>;
    fn insert_user(&self, user: &UserRow) -> DbResult<()>;
    fn update_user(&self, user: &UserRow) -> DbResult<()>;
}

impl UserStore for Database {
    fn get_user_by_mxid(&self, mxid: &str) -> DbResult<Option<UserRow>> {
        let conn = self.conn()?;
        let sql = format!(r#"SELECT {} FROM "user" WHERE mxid = ?1"#, USER_COLUMNS);
        Ok(conn.query_row(&sql, params![mxid], UserRow::scan).optional()?)
    }

    fn get_user_by_id(&self, discord_id: &str) -> DbResult<Option<UserRow>> {
        let conn = self.conn()?;
        let sql = format!(r#"SELECT {} FROM "user" WHERE dcid = ?1"#, USER_COLUMNS);
        Ok(conn
            .query_row(&sql, params![discord_id], UserRow::scan)
            .optional()?)
    }

    fn get_all_users_with_token(&self) -> DbResult<Vec<UserRow>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"SELECT {} FROM "user" WHERE discord_token IS NOT NULL AND discord_token <> ''"#,
            USER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], UserRow::scan)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn insert_user(&self, user: &UserRow) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO "user" (mxid, dcid, discord_token, management_room, space_room, dm_space_room, read_state_version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                user.mxid,
                str_or_null(&user.discord_id),
                str_or_null(&user.discord_token),
                str_or_null(&user.management_room),
                str_or_null(&user.space_room),
                str_or_null(&user.dm_space_room),
                user.read_state_version,
            ],
        )?;
        Ok(())
    }

    fn update_user(&self, user: &UserRow) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE "user" SET dcid = ?1, discord_token = ?2, management_room = ?3,
                   space_room = ?4, dm_space_room = ?5, read_state_version = ?6
               WHERE mxid = ?7"#,
            params![
                str_or_null(&user.discord_id),
                str_or_null(&user.discord_token),
                str_or_null(&user.management_room),
                str_or_null(&user.space_room),
                str_or_null(&user.dm_space_room),
                user.read_state_version,
                user.mxid,
            ],
        )?;
        Ok(())
    }
}
