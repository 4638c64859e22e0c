//! Typed payload bodies for handshake and application frames.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::{Guild, User};

/// Payload of the Hello frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
    /// Server debug trace.
    #[serde(rename = "_trace", default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl Hello {
    /// Heartbeat interval as a duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// Client properties reported during Identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system.
    #[serde(rename = "$os")]
    pub os: String,
    /// Library name.
    #[serde(rename = "$browser")]
    pub browser: String,
    /// Device name.
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "cord".to_string(),
            device: "cord".to_string(),
        }
    }
}

/// Identify handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    /// Bot token.
    pub token: String,
    /// Client properties.
    pub properties: ConnectionProperties,
    /// Whether the client supports payload compression.
    pub compress: bool,
    /// Member count above which offline members are not sent.
    pub large_threshold: u32,
    /// `[shard_id, shard_count]`.
    pub shard: [u32; 2],
}

impl Identify {
    /// Default large-guild threshold.
    pub const DEFAULT_LARGE_THRESHOLD: u32 = 50;

    /// Identify as the single shard of a single-session client.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: ConnectionProperties::default(),
            compress: false,
            large_threshold: Self::DEFAULT_LARGE_THRESHOLD,
            shard: [0, 1],
        }
    }

    /// Set the large-guild threshold.
    #[must_use]
    pub const fn with_large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }
}

/// Resume handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// Bot token.
    pub token: String,
    /// Session being resumed.
    pub session_id: String,
    /// Last sequence number received.
    pub seq: u64,
}

/// Request for offline guild members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMembersRequest {
    /// Guild to query.
    pub guild_id: String,
    /// Username prefix, empty for all.
    pub query: String,
    /// Maximum members to return, 0 for no limit.
    pub limit: u32,
}

/// Voice state update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    /// Guild id.
    pub guild_id: String,
    /// Channel to join, `None` to disconnect.
    pub channel_id: Option<String>,
    /// Self-muted.
    pub self_mute: bool,
    /// Self-deafened.
    pub self_deaf: bool,
}

/// Activity shown in a presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity name.
    pub name: String,
    /// Activity type (0 = playing, 1 = streaming, 2 = listening, 3 = watching).
    #[serde(rename = "type")]
    pub kind: u8,
    /// Stream url, only for streaming activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Presence (status update) payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Unix time in ms since the client went idle.
    pub since: Option<u64>,
    /// Current activity.
    pub game: Option<Activity>,
    /// `online`, `dnd`, `idle`, `invisible` or `offline`.
    pub status: String,
    /// Whether the client is away.
    pub afk: bool,
}

impl Presence {
    /// Online presence with no activity.
    #[must_use]
    pub fn online() -> Self {
        Self {
            since: None,
            game: None,
            status: "online".to_string(),
            afk: false,
        }
    }

    /// Set the activity.
    #[must_use]
    pub fn with_activity(mut self, name: impl Into<String>, kind: u8) -> Self {
        self.game = Some(Activity {
            name: name.into(),
            kind,
            url: None,
        });
        self
    }
}

/// READY dispatch payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version.
    #[serde(rename = "v", default)]
    pub version: u32,
    /// The connected user.
    pub user: User,
    /// Guilds the user is in (initially unavailable stubs).
    #[serde(default)]
    pub guilds: Vec<Guild>,
    /// Session id used for Resume.
    pub session_id: String,
    /// Server debug trace.
    #[serde(rename = "_trace", default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identify_defaults() {
        let identify = Identify::new("token");
        assert_eq!(identify.shard, [0, 1]);
        assert_eq!(identify.large_threshold, 50);
        assert!(!identify.compress);
    }

    #[test]
    fn test_identify_properties_use_dollar_keys() {
        let value = serde_json::to_value(Identify::new("token")).expect("serialize");
        let props = &value["properties"];
        assert_eq!(props["$browser"], "cord");
        assert_eq!(props["$device"], "cord");
        assert!(props.get("$os").is_some());
    }

    #[test]
    fn test_ready_decode() {
        let ready: Ready = serde_json::from_value(json!({
            "v": 6,
            "user": {"id": "10", "username": "bot"},
            "guilds": [{"id": "1", "unavailable": true}, {"id": "2", "unavailable": true}],
            "session_id": "sess",
            "private_channels": []
        }))
        .expect("ready");

        assert_eq!(ready.version, 6);
        assert_eq!(ready.session_id, "sess");
        assert_eq!(ready.guilds.len(), 2);
        assert_eq!(ready.user.id, "10");
    }

    #[test]
    fn test_presence_builder() {
        let presence = Presence::online().with_activity("chess", 0);
        let value = serde_json::to_value(&presence).expect("serialize");
        assert_eq!(value["status"], "online");
        assert_eq!(value["game"]["name"], "chess");
        assert_eq!(value["game"]["type"], 0);
    }

    #[test]
    fn test_hello_interval() {
        let hello = Hello {
            heartbeat_interval: 41_250,
            trace: vec![],
        };
        assert_eq!(hello.interval(), Duration::from_millis(41_250));
    }
}
