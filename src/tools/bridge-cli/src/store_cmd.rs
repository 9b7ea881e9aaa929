use bridge_db::{Database, PuppetFilter, PuppetStore, UserStore};
use discord_bridge::{BridgeConfig, UserId};
use serde_json::json;

fn open_db(config: &BridgeConfig) -> Result<Database, String> {
    let path = config.database_path();
    Database::open(&path).map_err(|err| {
        println!("open database {} failed! {}", path.display(), err);
        format!("open database failed: {}", err)
    })
}

pub fn list_puppets(config: &BridgeConfig, claimed_only: bool) -> Result<(), String> {
    let db = open_db(config)?;
    let filter = if claimed_only {
        PuppetFilter::WithCustomMxid
    } else {
        PuppetFilter::All
    };
    let rows = db
        .get_all(filter)
        .map_err(|err| format!("scan puppets failed: {}", err))?;
    for row in rows {
        let line = serde_json::to_string(&row).map_err(|err| err.to_string())?;
        println!("{}", line);
    }
    Ok(())
}

pub fn show_puppet(config: &BridgeConfig, id: &str) -> Result<(), String> {
    let db = open_db(config)?;
    let naming = config.puppet_naming().map_err(|err| err.to_string())?;
    match db.get(id).map_err(|err| format!("load puppet failed: {}", err))? {
        Some(row) => {
            let view = json!({
                "mxid": naming.format_puppet_mxid(&row.id).to_string(),
                "puppet": row,
            });
            let text = serde_json::to_string_pretty(&view).map_err(|err| err.to_string())?;
            println!("{}", text);
            Ok(())
        }
        None => {
            println!("puppet {} not found", id);
            Err(format!("puppet {} not found", id))
        }
    }
}

pub fn parse_mxid(config: &BridgeConfig, mxid: &str) -> Result<(), String> {
    let naming = config.puppet_naming().map_err(|err| err.to_string())?;
    let user_id = UserId::parse(mxid).map_err(|err| err.to_string())?;
    match naming.parse_puppet_mxid(&user_id) {
        Some(id) => println!("{}", id),
        None => println!("{} is not a puppet", user_id),
    }
    Ok(())
}

pub fn list_users(config: &BridgeConfig) -> Result<(), String> {
    let db = open_db(config)?;
    let users = db
        .get_all_users_with_token()
        .map_err(|err| format!("scan users failed: {}", err))?;
    for user in users {
        // tokens are never printed
        let line = json!({
            "mxid": user.mxid,
            "discord_id": user.discord_id,
            "management_room": user.management_room,
            "read_state_version": user.read_state_version,
        });
        println!("{}", line);
    }
    Ok(())
}
