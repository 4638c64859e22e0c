//! Consumer-facing events and handler registration.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use cord_proto::{
    Channel, EventName, Guild, GuildMember, PresenceUpdate, Ready, Role, User,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::error;

use crate::client::GatewayClient;

/// Events delivered to registered handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// The socket opened.
    SocketOpened,
    /// The socket closed.
    SocketClosed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// Whether a close frame was exchanged.
        was_clean: bool,
    },
    /// A transport error occurred.
    SocketErrored(String),
    /// A heartbeat was sent.
    HeartbeatSent {
        /// Timestamp carried in the heartbeat, ms since epoch.
        timestamp_ms: Option<i64>,
    },

    /// READY.
    Ready(Box<Ready>),
    /// RESUMED.
    Resumed,

    /// GUILD_CREATE.
    GuildCreate(Box<Guild>),
    /// GUILD_UPDATE.
    GuildUpdate {
        /// New state.
        guild: Box<Guild>,
        /// Cached state before the update.
        previous: Option<Box<Guild>>,
    },
    /// GUILD_DELETE.
    GuildDelete {
        /// Guild id.
        guild_id: String,
        /// Whether the guild merely became unavailable.
        unavailable: bool,
        /// Cached state before removal.
        previous: Option<Box<Guild>>,
    },
    /// CHANNEL_CREATE.
    ChannelCreate(Channel),
    /// CHANNEL_UPDATE.
    ChannelUpdate {
        /// New state.
        channel: Channel,
        /// Cached state before the update.
        previous: Option<Channel>,
    },
    /// CHANNEL_DELETE.
    ChannelDelete(Channel),
    /// GUILD_MEMBER_ADD.
    GuildMemberAdd(GuildMember),
    /// GUILD_MEMBER_UPDATE.
    GuildMemberUpdate {
        /// New state.
        member: GuildMember,
        /// Cached state before the update.
        previous: Option<GuildMember>,
    },
    /// GUILD_MEMBER_REMOVE.
    GuildMemberRemove {
        /// Guild id.
        guild_id: String,
        /// Removed user.
        user: User,
        /// Cached member before removal.
        previous: Option<GuildMember>,
    },
    /// GUILD_ROLE_CREATE.
    GuildRoleCreate {
        /// Guild id.
        guild_id: String,
        /// New role.
        role: Role,
    },
    /// GUILD_ROLE_UPDATE.
    GuildRoleUpdate {
        /// Guild id.
        guild_id: String,
        /// New state.
        role: Role,
        /// Cached state before the update.
        previous: Option<Role>,
    },
    /// GUILD_ROLE_DELETE.
    GuildRoleDelete {
        /// Guild id.
        guild_id: String,
        /// Deleted role id.
        role_id: String,
        /// Cached role before removal.
        previous: Option<Role>,
    },
    /// PRESENCE_UPDATE.
    PresenceUpdate(PresenceUpdate),
    /// USER_UPDATE.
    UserUpdate {
        /// New state.
        user: User,
        /// Cached state before the update.
        previous: Option<User>,
    },

    /// Any other known dispatch, forwarded with its raw payload.
    Dispatch {
        /// Event name.
        name: EventName,
        /// Raw payload.
        data: Value,
    },
    /// A dispatch name this client does not know.
    Unhandled {
        /// Event name as sent.
        name: String,
        /// Raw payload.
        data: Value,
    },
}

impl GatewayEvent {
    /// Short name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::SocketOpened => "SOCKET_OPENED",
            Self::SocketClosed { .. } => "SOCKET_CLOSED",
            Self::SocketErrored(_) => "SOCKET_ERRORED",
            Self::HeartbeatSent { .. } => "HEARTBEAT_SENT",
            Self::Ready(_) => EventName::Ready.as_str(),
            Self::Resumed => EventName::Resumed.as_str(),
            Self::GuildCreate(_) => EventName::GuildCreate.as_str(),
            Self::GuildUpdate { .. } => EventName::GuildUpdate.as_str(),
            Self::GuildDelete { .. } => EventName::GuildDelete.as_str(),
            Self::ChannelCreate(_) => EventName::ChannelCreate.as_str(),
            Self::ChannelUpdate { .. } => EventName::ChannelUpdate.as_str(),
            Self::ChannelDelete(_) => EventName::ChannelDelete.as_str(),
            Self::GuildMemberAdd(_) => EventName::GuildMemberAdd.as_str(),
            Self::GuildMemberUpdate { .. } => EventName::GuildMemberUpdate.as_str(),
            Self::GuildMemberRemove { .. } => EventName::GuildMemberRemove.as_str(),
            Self::GuildRoleCreate { .. } => EventName::GuildRoleCreate.as_str(),
            Self::GuildRoleUpdate { .. } => EventName::GuildRoleUpdate.as_str(),
            Self::GuildRoleDelete { .. } => EventName::GuildRoleDelete.as_str(),
            Self::PresenceUpdate(_) => EventName::PresenceUpdate.as_str(),
            Self::UserUpdate { .. } => EventName::UserUpdate.as_str(),
            Self::Dispatch { name, .. } => name.as_str(),
            Self::Unhandled { name, .. } => name,
        }
    }

    /// Whether this is a socket or heartbeat notification rather than a dispatch.
    pub const fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::SocketOpened
                | Self::SocketClosed { .. }
                | Self::SocketErrored(_)
                | Self::HeartbeatSent { .. }
        )
    }
}

/// Receives gateway events.
///
/// Handlers run on the client's event loop (or its heartbeat task for
/// [`GatewayEvent::HeartbeatSent`]) and must not block.
pub trait EventHandler: Send + Sync {
    /// Called once per event.
    fn on_event(&self, client: &GatewayClient, event: &GatewayEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&GatewayClient, &GatewayEvent) + Send + Sync,
{
    fn on_event(&self, client: &GatewayClient, event: &GatewayEvent) {
        self(client, event);
    }
}

/// Named handler registry with per-handler panic isolation.
#[derive(Default)]
pub struct EventHub {
    handlers: RwLock<Vec<(String, Arc<dyn EventHandler>)>>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("handlers", &self.names())
            .finish()
    }
}

impl EventHub {
    /// Empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Returns `true` if it replaced an
    /// existing handler with that name.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn EventHandler>) -> bool {
        let name = name.into();
        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = handler;
            true
        } else {
            handlers.push((name, handler));
            false
        }
    }

    /// Remove the handler registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(n, _)| n != name);
        handlers.len() != before
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.handlers.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every handler. A panicking handler is logged and skipped.
    pub fn emit(&self, client: &GatewayClient, event: &GatewayEvent) {
        let handlers: Vec<(String, Arc<dyn EventHandler>)> = self.handlers.read().clone();

        for (name, handler) in handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler.on_event(client, event)));
            if result.is_err() {
                error!(handler = %name, event = event.name(), "event handler panicked");
            }
        }
    }
}
