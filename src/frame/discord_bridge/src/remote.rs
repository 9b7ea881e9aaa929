use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

const DISCORD_CDN: &str = "https://cdn.discordapp.com";

/// A remote user profile as returned by the remote service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub discriminator: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub avatar: String,
    #[serde(default)]
    pub bot: bool,
}

// the API sends null for unset strings such as a missing avatar
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl RemoteUser {
    /// Partial user objects from some gateway events carry only the id.
    pub fn has_required_fields(&self) -> bool {
        !self.username.is_empty() && !self.discriminator.is_empty()
    }

    pub fn display_name(&self) -> &str {
        match self.global_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    pub fn avatar_url(&self) -> String {
        if self.avatar.is_empty() {
            return String::new();
        }
        let ext = if self.avatar.starts_with("a_") { "gif" } else { "png" };
        format!("{}/avatars/{}/{}.{}", DISCORD_CDN, self.id, self.avatar, ext)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelType {
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildNews,
    GuildStore,
    GuildNewsThread,
    GuildPublicThread,
    GuildPrivateThread,
    GuildStageVoice,
    GuildForum,
    Unknown(u8),
}

impl ChannelType {
    pub fn is_private(&self) -> bool {
        matches!(self, ChannelType::Dm | ChannelType::GroupDm)
    }
}

impl From<u8> for ChannelType {
    fn from(code: u8) -> Self {
        match code {
            0 => ChannelType::GuildText,
            1 => ChannelType::Dm,
            2 => ChannelType::GuildVoice,
            3 => ChannelType::GroupDm,
            4 => ChannelType::GuildCategory,
            5 => ChannelType::GuildNews,
            6 => ChannelType::GuildStore,
            10 => ChannelType::GuildNewsThread,
            11 => ChannelType::GuildPublicThread,
            12 => ChannelType::GuildPrivateThread,
            13 => ChannelType::GuildStageVoice,
            15 => ChannelType::GuildForum,
            other => ChannelType::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(kind: ChannelType) -> Self {
        match kind {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildNews => 5,
            ChannelType::GuildStore => 6,
            ChannelType::GuildNewsThread => 10,
            ChannelType::GuildPublicThread => 11,
            ChannelType::GuildPrivateThread => 12,
            ChannelType::GuildStageVoice => 13,
            ChannelType::GuildForum => 15,
            ChannelType::Unknown(code) => code,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteKind {
    Role,
    Member,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub id: String,
    pub kind: OverwriteKind,
    pub allow: u64,
    pub deny: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    /// Empty for private channels.
    pub guild_id: String,
    pub channel_type: ChannelType,
    pub name: String,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl Channel {
    pub fn new(id: &str, guild_id: &str, channel_type: ChannelType) -> Self {
        Channel {
            id: id.to_string(),
            guild_id: guild_id.to_string(),
            channel_type,
            name: String::new(),
            permission_overwrites: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub permissions: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guild {
    pub id: String,
    pub owner_id: String,
    pub roles: Vec<Role>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub guild_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    pub nick: Option<String>,
}

/// Permission bits, same values as the remote API.
pub mod permissions {
    pub const CREATE_INSTANT_INVITE: u64 = 1 << 0;
    pub const KICK_MEMBERS: u64 = 1 << 1;
    pub const BAN_MEMBERS: u64 = 1 << 2;
    pub const ADMINISTRATOR: u64 = 1 << 3;
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    pub const MANAGE_GUILD: u64 = 1 << 5;
    pub const ADD_REACTIONS: u64 = 1 << 6;
    pub const VIEW_AUDIT_LOG: u64 = 1 << 7;
    pub const PRIORITY_SPEAKER: u64 = 1 << 8;
    pub const STREAM: u64 = 1 << 9;
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const SEND_MESSAGES: u64 = 1 << 11;
    pub const SEND_TTS_MESSAGES: u64 = 1 << 12;
    pub const MANAGE_MESSAGES: u64 = 1 << 13;
    pub const EMBED_LINKS: u64 = 1 << 14;
    pub const ATTACH_FILES: u64 = 1 << 15;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
    pub const MENTION_EVERYONE: u64 = 1 << 17;
    pub const USE_EXTERNAL_EMOJIS: u64 = 1 << 18;
    pub const VOICE_CONNECT: u64 = 1 << 20;
    pub const VOICE_SPEAK: u64 = 1 << 21;
    pub const VOICE_MUTE_MEMBERS: u64 = 1 << 22;
    pub const VOICE_DEAFEN_MEMBERS: u64 = 1 << 23;
    pub const VOICE_MOVE_MEMBERS: u64 = 1 << 24;
    pub const VOICE_USE_VAD: u64 = 1 << 25;
    pub const CHANGE_NICKNAME: u64 = 1 << 26;
    pub const MANAGE_NICKNAMES: u64 = 1 << 27;
    pub const MANAGE_ROLES: u64 = 1 << 28;
    pub const MANAGE_WEBHOOKS: u64 = 1 << 29;
    pub const MANAGE_EMOJIS: u64 = 1 << 30;

    pub const ALL_TEXT: u64 = VIEW_CHANNEL
        | SEND_MESSAGES
        | SEND_TTS_MESSAGES
        | MANAGE_MESSAGES
        | EMBED_LINKS
        | ATTACH_FILES
        | READ_MESSAGE_HISTORY
        | MENTION_EVERYONE;
    pub const ALL_VOICE: u64 = VOICE_CONNECT
        | VOICE_SPEAK
        | VOICE_MUTE_MEMBERS
        | VOICE_DEAFEN_MEMBERS
        | VOICE_MOVE_MEMBERS
        | VOICE_USE_VAD
        | PRIORITY_SPEAKER;
    pub const ALL_CHANNEL: u64 =
        ALL_TEXT | ALL_VOICE | CREATE_INSTANT_INVITE | MANAGE_ROLES | MANAGE_CHANNELS | ADD_REACTIONS
            | VIEW_AUDIT_LOG;
    pub const ALL: u64 = ALL_CHANNEL
        | KICK_MEMBERS
        | BAN_MEMBERS
        | MANAGE_GUILD
        | ADMINISTRATOR
        | MANAGE_WEBHOOKS
        | MANAGE_EMOJIS;
}

/// Network side of a logged-in remote session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn fetch_user(&self, user_id: &str) -> AnyResult<RemoteUser>;
    async fn fetch_guild_member(&self, guild_id: &str, user_id: &str) -> AnyResult<Member>;
}
