//! Frame envelopes.
//!
//! Inbound frames are `{ "op", "t", "d", "s" }`; outbound frames are
//! `{ "op", "d" }` with a typed payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtoError, ProtoResult};
use crate::opcode::OpCode;
use crate::payloads::{GuildMembersRequest, Hello, Identify, Presence, Resume, VoiceStateUpdate};

/// A frame received from the gateway.
///
/// The opcode is kept raw so frames with opcodes this client does not know
/// still decode and can be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Raw opcode.
    pub op: u8,
    /// Event name, only set on dispatch frames.
    #[serde(rename = "t", default)]
    pub event_name: Option<String>,
    /// Opaque payload.
    #[serde(rename = "d", default)]
    pub data: Value,
    /// Sequence number, only set on dispatch frames.
    #[serde(rename = "s", default)]
    pub sequence: Option<u64>,
}

impl InboundFrame {
    /// Decode a frame from JSON text.
    pub fn from_json(text: &str) -> ProtoResult<Self> {
        serde_json::from_str(text).map_err(|e| ProtoError::Decoding(e.to_string()))
    }

    /// Encode the frame to JSON text.
    pub fn to_json(&self) -> ProtoResult<String> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// The typed opcode.
    pub fn opcode(&self) -> ProtoResult<OpCode> {
        OpCode::try_from(self.op)
    }

    /// Deserialize the payload into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> ProtoResult<T> {
        T::deserialize(&self.data).map_err(|e| ProtoError::Decoding(e.to_string()))
    }

    /// Build a frame with no event name or sequence.
    #[must_use]
    pub fn control(op: OpCode, data: Value) -> Self {
        Self {
            op: op.into(),
            event_name: None,
            data,
            sequence: None,
        }
    }

    /// Build a Hello frame.
    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        let hello = Hello {
            heartbeat_interval: heartbeat_interval_ms,
            trace: Vec::new(),
        };
        Self::control(
            OpCode::Hello,
            serde_json::to_value(hello).unwrap_or(Value::Null),
        )
    }

    /// Build a dispatch frame.
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch.into(),
            event_name: Some(event_name.into()),
            data,
            sequence: Some(sequence),
        }
    }

    /// Build a heartbeat acknowledgement.
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, Value::Null)
    }

    /// Build an invalid-session notice.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Value::Bool(resumable))
    }
}

/// A frame sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame<T> {
    /// Opcode.
    pub op: OpCode,
    /// Typed payload.
    #[serde(rename = "d")]
    pub data: T,
}

impl<T: Serialize> OutboundFrame<T> {
    /// Create a new outbound frame.
    pub const fn new(op: OpCode, data: T) -> Self {
        Self { op, data }
    }

    /// Encode the frame to JSON text.
    pub fn to_json(&self) -> ProtoResult<String> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }
}

impl<T: DeserializeOwned> OutboundFrame<T> {
    /// Decode an outbound frame from JSON text.
    pub fn from_json(text: &str) -> ProtoResult<Self> {
        serde_json::from_str(text).map_err(|e| ProtoError::Decoding(e.to_string()))
    }
}

impl OutboundFrame<Identify> {
    /// Identify handshake.
    #[must_use]
    pub const fn identify(identify: Identify) -> Self {
        Self::new(OpCode::Identify, identify)
    }
}

impl OutboundFrame<Resume> {
    /// Resume handshake.
    #[must_use]
    pub const fn resume(resume: Resume) -> Self {
        Self::new(OpCode::Resume, resume)
    }
}

impl OutboundFrame<Option<i64>> {
    /// Heartbeat carrying the previous heartbeat timestamp (ms since epoch).
    #[must_use]
    pub const fn heartbeat(timestamp_ms: Option<i64>) -> Self {
        Self::new(OpCode::Heartbeat, timestamp_ms)
    }
}

impl OutboundFrame<GuildMembersRequest> {
    /// Request guild members.
    #[must_use]
    pub const fn request_guild_members(request: GuildMembersRequest) -> Self {
        Self::new(OpCode::RequestGuildMembers, request)
    }
}

impl OutboundFrame<VoiceStateUpdate> {
    /// Update voice state.
    #[must_use]
    pub const fn voice_state_update(update: VoiceStateUpdate) -> Self {
        Self::new(OpCode::VoiceStateUpdate, update)
    }
}

impl OutboundFrame<Presence> {
    /// Update presence.
    #[must_use]
    pub const fn status_update(presence: Presence) -> Self {
        Self::new(OpCode::StatusUpdate, presence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_dispatch_frame() {
        let text = r#"{"op":0,"t":"MESSAGE_CREATE","d":{"id":"1"},"s":42}"#;
        let frame = InboundFrame::from_json(text).expect("decode");

        assert_eq!(frame.opcode().ok(), Some(OpCode::Dispatch));
        assert_eq!(frame.event_name.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(frame.sequence, Some(42));
        assert_eq!(frame.data, json!({"id": "1"}));
    }

    #[test]
    fn test_decode_control_frame_with_nulls() {
        let text = r#"{"op":11,"t":null,"d":null,"s":null}"#;
        let frame = InboundFrame::from_json(text).expect("decode");

        assert_eq!(frame.opcode().ok(), Some(OpCode::HeartbeatAck));
        assert!(frame.event_name.is_none());
        assert!(frame.sequence.is_none());
    }

    #[test]
    fn test_decode_frame_with_unknown_opcode() {
        let frame = InboundFrame::from_json(r#"{"op":99}"#).expect("decode");
        assert_eq!(frame.op, 99);
        assert!(frame.opcode().is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            InboundFrame::from_json("not json"),
            Err(ProtoError::Decoding(_))
        ));
    }

    #[test]
    fn test_hello_payload() {
        let frame = InboundFrame::hello(45_000);
        let hello: Hello = frame.data_as().expect("hello");
        assert_eq!(hello.heartbeat_interval, 45_000);
    }

    #[test]
    fn test_heartbeat_frame_encoding() {
        let json = OutboundFrame::heartbeat(Some(1_700_000_000_000))
            .to_json()
            .expect("encode");
        assert_eq!(json, r#"{"op":1,"d":1700000000000}"#);

        let json = OutboundFrame::heartbeat(None).to_json().expect("encode");
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_resume_frame_encoding() {
        let frame = OutboundFrame::resume(Resume {
            token: "secret".to_string(),
            session_id: "abc".to_string(),
            seq: 17,
        });
        let decoded: OutboundFrame<Value> =
            OutboundFrame::from_json(&frame.to_json().expect("encode")).expect("decode");

        assert_eq!(decoded.op, OpCode::Resume);
        assert_eq!(
            decoded.data,
            json!({"token": "secret", "session_id": "abc", "seq": 17})
        );
    }
}
