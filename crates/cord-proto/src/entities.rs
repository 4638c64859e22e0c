//! Minimal entity records the client caches.
//!
//! Only the identity fields the cache keys on are typed; everything else the
//! server sends is preserved in `extra` and round-trips untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake id.
    pub id: String,
    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// User with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            extra: Map::new(),
        }
    }
}

/// A guild channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Snowflake id.
    pub id: String,
    /// Owning guild, absent for direct messages and inside GUILD_CREATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Channel name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A guild role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Snowflake id.
    pub id: String,
    /// Role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A member of a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
    /// The member's user record.
    pub user: User,
    /// Owning guild, set on member events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Guild nickname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Role ids.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A guild with the collections the cache tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    /// Snowflake id.
    pub id: String,
    /// Guild name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// True for the stubs sent in READY and during outages.
    #[serde(default)]
    pub unavailable: bool,
    /// Channels (GUILD_CREATE only).
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Members (GUILD_CREATE only).
    #[serde(default)]
    pub members: Vec<GuildMember>,
    /// Roles.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// GUILD_MEMBER_REMOVE payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberRemove {
    /// Guild id.
    pub guild_id: String,
    /// Removed user.
    pub user: User,
}

/// GUILD_ROLE_CREATE / GUILD_ROLE_UPDATE payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleEvent {
    /// Guild id.
    pub guild_id: String,
    /// The role.
    pub role: Role,
}

/// GUILD_ROLE_DELETE payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    /// Guild id.
    pub guild_id: String,
    /// Deleted role id.
    pub role_id: String,
}

/// PRESENCE_UPDATE payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Updated user (may be partial).
    pub user: User,
    /// Guild the presence applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = json!({"id": "5", "name": "general", "type": 0, "position": 3});
        let channel: Channel = serde_json::from_value(raw.clone()).expect("channel");

        assert_eq!(channel.name.as_deref(), Some("general"));
        assert_eq!(channel.extra.get("position"), Some(&json!(3)));
        assert_eq!(serde_json::to_value(&channel).expect("serialize"), raw);
    }

    #[test]
    fn test_member_event_carries_guild_id() {
        let member: GuildMember = serde_json::from_value(json!({
            "guild_id": "1",
            "user": {"id": "9", "username": "alice"},
            "roles": ["r1"],
            "joined_at": "2018-01-01T00:00:00Z"
        }))
        .expect("member");

        assert_eq!(member.guild_id.as_deref(), Some("1"));
        assert_eq!(member.user.username.as_deref(), Some("alice"));
        assert_eq!(member.roles, vec!["r1".to_string()]);
        assert!(member.extra.contains_key("joined_at"));
    }

    #[test]
    fn test_unavailable_guild_stub() {
        let guild: Guild =
            serde_json::from_value(json!({"id": "1", "unavailable": true})).expect("guild");
        assert!(guild.unavailable);
        assert!(guild.channels.is_empty());
        assert!(guild.members.is_empty());
    }
}
