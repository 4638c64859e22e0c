//! Gateway opcodes.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Integer tag identifying the purpose of a gateway frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    /// Server dispatches an event (`t` names it, `s` sequences it).
    Dispatch = 0,
    /// Heartbeat, sent by the client on its cadence or requested by the server.
    Heartbeat = 1,
    /// Client handshake starting a new session.
    Identify = 2,
    /// Client presence update.
    StatusUpdate = 3,
    /// Client voice state update.
    VoiceStateUpdate = 4,
    /// Client handshake resuming a previous session.
    Resume = 6,
    /// Server asks the client to reconnect.
    Reconnect = 7,
    /// Client requests offline guild members.
    RequestGuildMembers = 8,
    /// Server reports the session is invalid.
    InvalidSession = 9,
    /// First frame after connecting, carries the heartbeat interval.
    Hello = 10,
    /// Server acknowledges a heartbeat.
    HeartbeatAck = 11,
}

impl OpCode {
    /// Human-readable name used in log lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Heartbeat => "heartbeat",
            Self::Identify => "identify",
            Self::StatusUpdate => "status_update",
            Self::VoiceStateUpdate => "voice_state_update",
            Self::Resume => "resume",
            Self::Reconnect => "reconnect",
            Self::RequestGuildMembers => "request_guild_members",
            Self::InvalidSession => "invalid_session",
            Self::Hello => "hello",
            Self::HeartbeatAck => "heartbeat_ack",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::StatusUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(ProtoError::UnknownOpcode(other)),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as Self
    }
}
