//! # cord-gateway
//!
//! Client for the gateway push protocol: a persistent WebSocket session
//! that identifies or resumes, keeps itself alive with heartbeats, tracks
//! the dispatch sequence, reconnects with backoff and fans decoded events
//! out to registered [`EventHandler`]s.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod reconnect;
pub mod registry;
pub mod session;
pub mod socket;
pub mod state;

pub use cache::{CachedGuild, GuildCache};
pub use client::GatewayClient;
pub use config::{ClientSettings, ReconnectSettings};
pub use error::{ConnectionStateError, GatewayError, GatewayResult};
pub use events::{EventHandler, EventHub, GatewayEvent};
pub use heartbeat::{HeartbeatHandle, start_heartbeat_task};
pub use reconnect::ReconnectConfig;
pub use registry::ClientRegistry;
pub use session::Session;
pub use socket::{GatewaySocket, SocketEvent};
pub use state::{AtomicConnectionState, ConnectionState};
