use crate::remote::{permissions, Channel, ChannelType};
use crate::state::StateError;
use crate::user::User;
use log::*;

/// Type-only check: guild text and news channels always qualify, private
/// channels only with DM bridging enabled, everything else never.
pub fn channel_is_bridgeable(channel: &Channel, enable_dm_bridging: bool) -> bool {
    match channel.channel_type {
        ChannelType::GuildText | ChannelType::GuildNews => true,
        ChannelType::Dm | ChannelType::GroupDm => enable_dm_bridging,
        _ => false,
    }
}

impl User {
    /// Whether `channel` should be bridged for this user. Guild channels
    /// additionally need the view permission; when permissions cannot be
    /// computed at all the channel is treated as bridgeable.
    pub async fn channel_is_bridgeable(&self, channel: &Channel) -> bool {
        if !channel_is_bridgeable(channel, self.enable_dm_bridging()) {
            return false;
        }
        if channel.guild_id.is_empty() {
            return true;
        }

        let guild_id = &channel.guild_id;
        let user_id = self.discord_id();
        let state = self.state();

        match state.member(guild_id, &user_id) {
            Ok(_) => {}
            Err(StateError::NotFound(_)) => {
                debug!(
                    "fetching own membership in guild {} to check roles of channel {}",
                    guild_id, channel.id
                );
                match self.session().fetch_guild_member(guild_id, &user_id).await {
                    Ok(member) => {
                        if let Err(err) = state.member_add(member) {
                            warn!(
                                "failed to cache own membership in guild {}: {}",
                                guild_id, err
                            );
                        }
                    }
                    Err(err) => warn!(
                        "failed to get own membership in guild {} from server: {}",
                        guild_id, err
                    ),
                }
            }
            Err(err) => warn!(
                "failed to get own membership in guild {} from cache: {}",
                guild_id, err
            ),
        }

        if let Err(err) = state.channel_add(channel.clone()) {
            warn!("failed to cache channel {} of guild {}: {}", channel.id, guild_id, err);
        }

        match state.user_channel_permissions(&user_id, &channel.id) {
            Ok(perms) => {
                let view = perms & permissions::VIEW_CHANNEL != 0;
                debug!(
                    "permissions in channel {} of guild {}: {:#x}, view_channel={}",
                    channel.id, guild_id, perms, view
                );
                view
            }
            Err(err) => {
                warn!(
                    "failed to get permissions in channel {} of guild {}, assuming bridgeable: {}",
                    channel.id, guild_id, err
                );
                true
            }
        }
    }
}
