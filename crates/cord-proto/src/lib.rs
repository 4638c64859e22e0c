//! # cord-proto
//!
//! Wire definitions for the gateway protocol: opcodes, close codes, the
//! `{op, t, d, s}` frame envelope and the typed payloads the client core needs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod close_code;
pub mod entities;
pub mod error;
pub mod events;
pub mod frame;
pub mod opcode;
pub mod payloads;

pub use close_code::CloseDisposition;
pub use entities::{
    Channel, Guild, GuildMember, GuildMemberRemove, GuildRoleDelete, GuildRoleEvent,
    PresenceUpdate, Role, User,
};
pub use error::{ProtoError, ProtoResult};
pub use events::EventName;
pub use frame::{InboundFrame, OutboundFrame};
pub use opcode::OpCode;
pub use payloads::{
    Activity, ConnectionProperties, GuildMembersRequest, Hello, Identify, Presence, Ready, Resume,
    VoiceStateUpdate,
};
