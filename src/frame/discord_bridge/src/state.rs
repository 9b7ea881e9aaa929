use crate::remote::{permissions, Channel, Guild, Member, OverwriteKind};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state cache: {0} not found")]
    NotFound(String),
    #[error("state cache lock poisoned")]
    LockPoisoned,
}

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Default)]
struct StateStore {
    guilds: HashMap<String, Guild>,
    // guild id -> user id -> member
    members: HashMap<String, HashMap<String, Member>>,
    channels: HashMap<String, Channel>,
}

/// Per-session cache of guilds, members and channels seen by one remote
/// login. Every call takes the lock once; nothing here touches the network.
#[derive(Debug, Default)]
pub struct SessionState {
    store: RwLock<StateStore>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guild_add(&self, guild: Guild) -> StateResult<()> {
        let mut store = self.store.write().map_err(|_| StateError::LockPoisoned)?;
        store.members.entry(guild.id.clone()).or_default();
        store.guilds.insert(guild.id.clone(), guild);
        Ok(())
    }

    pub fn guild(&self, guild_id: &str) -> StateResult<Guild> {
        let store = self.store.read().map_err(|_| StateError::LockPoisoned)?;
        store
            .guilds
            .get(guild_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(format!("guild {}", guild_id)))
    }

    pub fn member(&self, guild_id: &str, user_id: &str) -> StateResult<Member> {
        let store = self.store.read().map_err(|_| StateError::LockPoisoned)?;
        store
            .members
            .get(guild_id)
            .and_then(|members| members.get(user_id))
            .cloned()
            .ok_or_else(|| StateError::NotFound(format!("member {} in guild {}", user_id, guild_id)))
    }

    pub fn member_add(&self, member: Member) -> StateResult<()> {
        let mut store = self.store.write().map_err(|_| StateError::LockPoisoned)?;
        if !store.guilds.contains_key(&member.guild_id) {
            return Err(StateError::NotFound(format!("guild {}", member.guild_id)));
        }
        store
            .members
            .entry(member.guild_id.clone())
            .or_default()
            .insert(member.user_id.clone(), member);
        Ok(())
    }

    pub fn channel(&self, channel_id: &str) -> StateResult<Channel> {
        let store = self.store.read().map_err(|_| StateError::LockPoisoned)?;
        store
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(format!("channel {}", channel_id)))
    }

    /// Adds or replaces a channel. Guild channels need their guild cached first.
    pub fn channel_add(&self, channel: Channel) -> StateResult<()> {
        let mut store = self.store.write().map_err(|_| StateError::LockPoisoned)?;
        if !channel.channel_type.is_private()
            && !channel.guild_id.is_empty()
            && !store.guilds.contains_key(&channel.guild_id)
        {
            return Err(StateError::NotFound(format!("guild {}", channel.guild_id)));
        }
        store.channels.insert(channel.id.clone(), channel);
        Ok(())
    }

    pub fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> StateResult<u64> {
        let store = self.store.read().map_err(|_| StateError::LockPoisoned)?;
        let channel = store
            .channels
            .get(channel_id)
            .ok_or_else(|| StateError::NotFound(format!("channel {}", channel_id)))?;
        let guild = store
            .guilds
            .get(&channel.guild_id)
            .ok_or_else(|| StateError::NotFound(format!("guild {}", channel.guild_id)))?;

        if guild.owner_id == user_id {
            return Ok(permissions::ALL);
        }

        let member = store
            .members
            .get(&guild.id)
            .and_then(|members| members.get(user_id))
            .ok_or_else(|| StateError::NotFound(format!("member {} in guild {}", user_id, guild.id)))?;

        Ok(member_permissions(guild, channel, member))
    }
}

/// Effective permissions of a member in a channel: base role permissions,
/// then `@everyone`, role and member overwrites in that order.
pub fn member_permissions(guild: &Guild, channel: &Channel, member: &Member) -> u64 {
    if guild.owner_id == member.user_id {
        return permissions::ALL;
    }

    let mut perms = 0u64;
    for role in &guild.roles {
        if role.id == guild.id || member.roles.contains(&role.id) {
            perms |= role.permissions;
        }
    }

    if perms & permissions::ADMINISTRATOR == permissions::ADMINISTRATOR {
        perms |= permissions::ALL;
    }

    // @everyone overwrite shares the guild id
    if let Some(ow) = channel
        .permission_overwrites
        .iter()
        .find(|ow| ow.kind == OverwriteKind::Role && ow.id == guild.id)
    {
        perms &= !ow.deny;
        perms |= ow.allow;
    }

    let mut deny = 0u64;
    let mut allow = 0u64;
    for ow in &channel.permission_overwrites {
        if ow.kind == OverwriteKind::Role && member.roles.contains(&ow.id) {
            deny |= ow.deny;
            allow |= ow.allow;
        }
    }
    perms &= !deny;
    perms |= allow;

    if let Some(ow) = channel
        .permission_overwrites
        .iter()
        .find(|ow| ow.kind == OverwriteKind::Member && ow.id == member.user_id)
    {
        perms &= !ow.deny;
        perms |= ow.allow;
    }

    if perms & permissions::ADMINISTRATOR == permissions::ADMINISTRATOR {
        perms |= permissions::ALL_CHANNEL;
    }

    perms
}
