//! Keyed guild cache maintained from dispatch events.

use std::collections::HashMap;

use cord_proto::{Channel, Guild, GuildMember, PresenceUpdate, Role, User};

/// One guild and its keyed collections.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGuild {
    /// Guild record with its collections stripped.
    pub guild: Guild,
    /// Channels by id.
    pub channels: HashMap<String, Channel>,
    /// Members by user id.
    pub members: HashMap<String, GuildMember>,
    /// Roles by id.
    pub roles: HashMap<String, Role>,
}

impl CachedGuild {
    fn from_guild(mut guild: Guild) -> Self {
        let channels = std::mem::take(&mut guild.channels)
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let members = std::mem::take(&mut guild.members)
            .into_iter()
            .map(|m| (m.user.id.clone(), m))
            .collect();
        let roles = std::mem::take(&mut guild.roles)
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self {
            guild,
            channels,
            members,
            roles,
        }
    }

    /// Reassemble the full guild record.
    pub fn to_guild(&self) -> Guild {
        let mut guild = self.guild.clone();
        guild.channels = self.channels.values().cloned().collect();
        guild.members = self.members.values().cloned().collect();
        guild.roles = self.roles.values().cloned().collect();
        guild
    }
}

/// Guilds the connected user belongs to, keyed by id.
#[derive(Debug, Default)]
pub struct GuildCache {
    guilds: HashMap<String, CachedGuild>,
    channel_index: HashMap<String, String>,
    current_user: Option<User>,
}

impl GuildCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything (READY).
    pub fn replace_all(&mut self, user: User, guilds: Vec<Guild>) {
        self.guilds.clear();
        self.channel_index.clear();
        self.current_user = Some(user);
        for guild in guilds {
            self.upsert_guild(guild);
        }
    }

    /// Insert or fully replace a guild (GUILD_CREATE). Returns the previous entry.
    pub fn upsert_guild(&mut self, guild: Guild) -> Option<Guild> {
        let cached = CachedGuild::from_guild(guild);
        let id = cached.guild.id.clone();
        for channel_id in cached.channels.keys() {
            self.channel_index.insert(channel_id.clone(), id.clone());
        }
        let previous = self.guilds.insert(id, cached)?;
        Some(self.forget_stale_channels(previous))
    }

    /// Apply a GUILD_UPDATE. Collections the update omits keep their cached contents.
    pub fn update_guild(&mut self, guild: Guild) -> Option<Guild> {
        let Some(existing) = self.guilds.get_mut(&guild.id) else {
            self.upsert_guild(guild);
            return None;
        };
        let previous = existing.to_guild();
        let update = CachedGuild::from_guild(guild);

        existing.guild = update.guild;
        if !update.roles.is_empty() {
            existing.roles = update.roles;
        }
        if !update.members.is_empty() {
            existing.members = update.members;
        }
        if !update.channels.is_empty() {
            existing.channels = update.channels;
            let id = existing.guild.id.clone();
            let channel_ids: Vec<String> = existing.channels.keys().cloned().collect();
            self.channel_index.retain(|_, guild_id| *guild_id != id);
            for channel_id in channel_ids {
                self.channel_index.insert(channel_id, id.clone());
            }
        }
        Some(previous)
    }

    /// Remove a guild (GUILD_DELETE).
    pub fn remove_guild(&mut self, guild_id: &str) -> Option<Guild> {
        let removed = self.guilds.remove(guild_id)?;
        self.channel_index.retain(|_, id| id != guild_id);
        Some(removed.to_guild())
    }

    fn forget_stale_channels(&mut self, previous: CachedGuild) -> Guild {
        let id = previous.guild.id.clone();
        if let Some(current) = self.guilds.get(&id) {
            for channel_id in previous.channels.keys() {
                if !current.channels.contains_key(channel_id) {
                    self.channel_index.remove(channel_id);
                }
            }
        }
        previous.to_guild()
    }

    /// Insert or replace a channel. Channels without a known guild are ignored.
    pub fn upsert_channel(&mut self, channel: Channel) -> Option<Channel> {
        let guild_id = channel
            .guild_id
            .clone()
            .or_else(|| self.channel_index.get(&channel.id).cloned())?;
        let guild = self.guilds.get_mut(&guild_id)?;
        self.channel_index.insert(channel.id.clone(), guild_id);
        guild.channels.insert(channel.id.clone(), channel)
    }

    /// Remove a channel.
    pub fn remove_channel(&mut self, channel_id: &str) -> Option<Channel> {
        let guild_id = self.channel_index.remove(channel_id)?;
        self.guilds.get_mut(&guild_id)?.channels.remove(channel_id)
    }

    /// Insert or replace a member of `guild_id`.
    pub fn upsert_member(&mut self, guild_id: &str, member: GuildMember) -> Option<GuildMember> {
        let guild = self.guilds.get_mut(guild_id)?;
        guild.members.insert(member.user.id.clone(), member)
    }

    /// Remove a member.
    pub fn remove_member(&mut self, guild_id: &str, user_id: &str) -> Option<GuildMember> {
        self.guilds.get_mut(guild_id)?.members.remove(user_id)
    }

    /// Insert or replace a role.
    pub fn upsert_role(&mut self, guild_id: &str, role: Role) -> Option<Role> {
        let guild = self.guilds.get_mut(guild_id)?;
        guild.roles.insert(role.id.clone(), role)
    }

    /// Remove a role.
    pub fn remove_role(&mut self, guild_id: &str, role_id: &str) -> Option<Role> {
        self.guilds.get_mut(guild_id)?.roles.remove(role_id)
    }

    /// Merge a presence's user fields into the member record. Returns the previous user.
    pub fn update_presence(&mut self, presence: &PresenceUpdate) -> Option<User> {
        let guild_id = presence.guild_id.as_deref()?;
        let member = self
            .guilds
            .get_mut(guild_id)?
            .members
            .get_mut(&presence.user.id)?;
        let previous = member.user.clone();
        merge_user(&mut member.user, &presence.user);
        Some(previous)
    }

    /// Apply USER_UPDATE to the current user and every member record of that user.
    pub fn update_user(&mut self, user: &User) -> Option<User> {
        for guild in self.guilds.values_mut() {
            if let Some(member) = guild.members.get_mut(&user.id) {
                merge_user(&mut member.user, user);
            }
        }
        match &mut self.current_user {
            Some(current) if current.id == user.id => {
                let previous = current.clone();
                merge_user(current, user);
                Some(previous)
            }
            _ => None,
        }
    }

    /// The connected user, once READY arrived.
    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// Cached guild.
    pub fn guild(&self, guild_id: &str) -> Option<&CachedGuild> {
        self.guilds.get(guild_id)
    }

    /// Cached channel, by id alone.
    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        let guild_id = self.channel_index.get(channel_id)?;
        self.guilds.get(guild_id)?.channels.get(channel_id)
    }

    /// Cached member.
    pub fn member(&self, guild_id: &str, user_id: &str) -> Option<&GuildMember> {
        self.guilds.get(guild_id)?.members.get(user_id)
    }

    /// Cached role.
    pub fn role(&self, guild_id: &str, role_id: &str) -> Option<&Role> {
        self.guilds.get(guild_id)?.roles.get(role_id)
    }

    /// Number of cached guilds.
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Ids of cached guilds.
    pub fn guild_ids(&self) -> impl Iterator<Item = &str> {
        self.guilds.keys().map(String::as_str)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.guilds.clear();
        self.channel_index.clear();
        self.current_user = None;
    }
}

/// Presence and user updates may be partial: only present fields overwrite.
fn merge_user(target: &mut User, update: &User) {
    if update.username.is_some() {
        target.username.clone_from(&update.username);
    }
    for (key, value) in &update.extra {
        target.extra.insert(key.clone(), value.clone());
    }
}
