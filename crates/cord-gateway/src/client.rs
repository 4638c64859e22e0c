//! The gateway client state machine.
//!
//! One [`GatewayClient`] owns a [`GatewaySocket`], a [`RestDispatcher`] and the
//! session. Inbound frames are processed one at a time by a single event
//! loop task, so session and cache updates never race each other. Heartbeats
//! run on their own task and only touch the socket's outbound queue.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use cord_proto::{
    CloseDisposition, EventName, GuildMemberRemove, GuildMembersRequest, GuildRoleDelete,
    GuildRoleEvent, Hello, Identify, InboundFrame, OpCode, OutboundFrame, Presence, ProtoError,
    ProtoResult, VoiceStateUpdate, close_code,
};
use cord_rest::{RequestMethod, RestDispatcher};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::GuildCache;
use crate::config::ClientSettings;
use crate::error::{ConnectionStateError, GatewayError, GatewayResult};
use crate::events::{EventHandler, EventHub, GatewayEvent};
use crate::heartbeat::{HeartbeatHandle, start_heartbeat_task};
use crate::session::Session;
use crate::socket::{GatewaySocket, SocketEvent};
use crate::state::{AtomicConnectionState, ConnectionState};

/// Called once with the client id after a full teardown.
pub(crate) type TeardownHook = Box<dyn FnOnce(Uuid) + Send>;

/// How a client ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Shutdown,
    AuthFailed { code: u16, reason: String },
}

#[derive(Deserialize)]
struct GatewayInfo {
    url: String,
}

#[derive(Deserialize)]
struct GuildDeletePayload {
    id: String,
    #[serde(default)]
    unavailable: bool,
}

struct ClientInner {
    id: Uuid,
    settings: ClientSettings,
    state: AtomicConnectionState,
    socket: Mutex<Option<Arc<GatewaySocket>>>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
    last_heartbeat_ms: AtomicI64,
    session: Mutex<Session>,
    hub: EventHub,
    cache: RwLock<GuildCache>,
    rest: RestDispatcher,
    handshake_sent: AtomicBool,
    pending: Mutex<Vec<String>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    torn_down: AtomicBool,
    outcome: watch::Sender<Option<Outcome>>,
    on_teardown: Mutex<Option<TeardownHook>>,
}

/// A gateway session with automatic heartbeat, resume and reconnect.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("session", &*self.inner.session.lock())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a disconnected client.
    pub fn new(settings: ClientSettings) -> GatewayResult<Self> {
        settings.validate()?;
        let rest = RestDispatcher::new(&settings.api_token, settings.rest_config())?;
        Ok(Self::with_rest(settings, rest))
    }

    /// Create a disconnected client around an existing dispatcher.
    pub fn with_rest(settings: ClientSettings, rest: RestDispatcher) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(ClientInner {
                id: Uuid::new_v4(),
                settings,
                state: AtomicConnectionState::new(ConnectionState::Disconnected),
                socket: Mutex::new(None),
                heartbeat: Mutex::new(None),
                last_heartbeat_ms: AtomicI64::new(0),
                session: Mutex::new(Session::new()),
                hub: EventHub::new(),
                cache: RwLock::new(GuildCache::new()),
                rest,
                handshake_sent: AtomicBool::new(false),
                pending: Mutex::new(Vec::new()),
                shutdown: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                torn_down: AtomicBool::new(false),
                outcome,
                on_teardown: Mutex::new(None),
            }),
        }
    }

    /// Create a client and start it.
    pub async fn connect(settings: ClientSettings) -> GatewayResult<Self> {
        let client = Self::new(settings)?;
        client.start().await?;
        Ok(client)
    }

    /// Resolve the gateway URL and open the connection.
    ///
    /// Fails if the client is already connecting or connected, or has been
    /// shut down. A failed first connection is returned and leaves the
    /// client disconnected; later drops reconnect on their own.
    pub async fn start(&self) -> GatewayResult<()> {
        self.inner.settings.validate()?;
        if self.is_shut_down() {
            return Err(ConnectionStateError::ReconnectOnClosedSocket.into());
        }
        match self
            .inner
            .state
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            Ok(()) => {}
            Err(ConnectionState::Connecting) => {
                return Err(ConnectionStateError::AlreadyConnecting.into());
            }
            Err(_) => return Err(ConnectionStateError::AlreadyConnected.into()),
        }

        if let Err(err) = self.open().await {
            self.inner.socket.lock().take();
            self.inner.state.store(ConnectionState::Disconnected);
            warn!(client = %self.inner.id, error = %err, "gateway start failed");
            return Err(err);
        }
        Ok(())
    }

    async fn open(&self) -> GatewayResult<()> {
        let url = self.resolve_gateway_url().await?;
        info!(client = %self.inner.id, url = %url, "connecting to gateway");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let socket = Arc::new(GatewaySocket::new(
            url,
            self.inner.settings.reconnect_config(),
            events_tx,
        ));
        *self.inner.socket.lock() = Some(Arc::clone(&socket));

        socket.connect().await?;

        let client = self.clone();
        self.track(tokio::spawn(client.event_loop(events_rx)));
        Ok(())
    }

    async fn resolve_gateway_url(&self) -> GatewayResult<String> {
        let settings = &self.inner.settings;
        let base = match &settings.gateway_url {
            Some(url) => url.clone(),
            None => {
                let info: GatewayInfo = self
                    .inner
                    .rest
                    .fetch("/gateway", RequestMethod::Get, None)
                    .await?;
                info.url
            }
        };

        let url = format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            settings.gateway_version
        );
        Url::parse(&url).map_err(|e| GatewayError::Config(format!("invalid gateway url {url}: {e}")))?;
        Ok(url)
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    async fn event_loop(self, mut events: mpsc::UnboundedReceiver<SocketEvent>) {
        loop {
            let event = tokio::select! {
                () = self.inner.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                SocketEvent::Opened => self.on_open(),
                SocketEvent::Message(text) => self.on_message(&text).await,
                SocketEvent::Closed {
                    code,
                    reason,
                    was_clean,
                } => self.on_close(code, reason, was_clean).await,
                SocketEvent::Errored(reason) => {
                    warn!(client = %self.inner.id, error = %reason, "gateway socket error");
                    self.emit(&GatewayEvent::SocketErrored(reason));
                }
            }
        }
        debug!(client = %self.inner.id, "event loop stopped");
    }

    fn on_open(&self) {
        self.inner.state.store(ConnectionState::Connected);
        self.inner.handshake_sent.store(false, Ordering::SeqCst);
        self.emit(&GatewayEvent::SocketOpened);
    }

    async fn on_message(&self, text: &str) {
        if self.inner.settings.debugging {
            debug!(client = %self.inner.id, frame = %text, "gateway frame received");
        }

        let frame = match InboundFrame::from_json(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(client = %self.inner.id, error = %err, "dropping undecodable frame");
                return;
            }
        };
        let op = match frame.opcode() {
            Ok(op) => op,
            Err(err) => {
                warn!(client = %self.inner.id, error = %err, "dropping frame");
                return;
            }
        };

        match op {
            OpCode::Dispatch => self.on_dispatch(frame),
            OpCode::Heartbeat => {
                self.send_heartbeat();
            }
            OpCode::Reconnect => {
                info!(client = %self.inner.id, "server requested reconnect");
                self.restart_connection("reconnect requested").await;
            }
            OpCode::InvalidSession => {
                info!(client = %self.inner.id, "session invalidated");
                self.inner.session.lock().reset();
                self.restart_connection("invalid session").await;
            }
            OpCode::Hello => self.on_hello(&frame),
            OpCode::HeartbeatAck => {
                if let Some(heartbeat) = self.inner.heartbeat.lock().as_ref() {
                    heartbeat.ack_received();
                }
            }
            other => debug!(client = %self.inner.id, op = other.name(), "ignoring client-only opcode"),
        }
    }

    async fn restart_connection(&self, reason: &str) {
        let socket = self.socket();
        if let Some(socket) = socket {
            socket.restart(close_code::RECONNECT_REQUESTED, reason).await;
        }
    }

    fn on_hello(&self, frame: &InboundFrame) {
        let hello: Hello = match frame.data_as() {
            Ok(hello) => hello,
            Err(err) => {
                warn!(client = %self.inner.id, error = %err, "malformed hello");
                return;
            }
        };

        let interval = hello.interval();
        self.inner
            .last_heartbeat_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        let weak: Weak<ClientInner> = Arc::downgrade(&self.inner);
        let heartbeat = start_heartbeat_task(interval, move || {
            weak.upgrade()
                .is_some_and(|inner| Self { inner }.send_heartbeat())
        });
        if let Some(previous) = self.inner.heartbeat.lock().replace(heartbeat) {
            previous.stop();
        }
        debug!(client = %self.inner.id, interval_ms = interval.as_millis() as u64, "heartbeat started");

        let handshake = match self.handshake_frame() {
            Ok(handshake) => handshake,
            Err(err) => {
                error!(client = %self.inner.id, error = %err, "failed to encode handshake");
                return;
            }
        };
        if let Err(err) = self.send_raw(handshake) {
            warn!(client = %self.inner.id, error = %err, "handshake not sent");
            return;
        }

        let mut pending = self.inner.pending.lock();
        self.inner.handshake_sent.store(true, Ordering::SeqCst);
        for frame in pending.drain(..) {
            if let Err(err) = self.send_raw(frame) {
                warn!(client = %self.inner.id, error = %err, "buffered frame dropped");
            }
        }
    }

    fn handshake_frame(&self) -> ProtoResult<String> {
        let token = &self.inner.settings.api_token;
        let resume = self.inner.session.lock().resume_payload(token);
        match resume {
            Some(resume) => {
                info!(client = %self.inner.id, session_id = %resume.session_id, seq = resume.seq, "resuming session");
                OutboundFrame::resume(resume).to_json()
            }
            None => {
                info!(client = %self.inner.id, "identifying");
                let identify =
                    Identify::new(token.clone()).with_large_threshold(self.inner.settings.large_threshold);
                OutboundFrame::identify(identify).to_json()
            }
        }
    }

    fn on_dispatch(&self, frame: InboundFrame) {
        if let Some(sequence) = frame.sequence {
            self.inner.session.lock().observe_sequence(sequence);
        }
        let Some(name) = frame.event_name else {
            warn!(client = %self.inner.id, "dispatch without event name");
            return;
        };

        let event = match name.parse::<EventName>() {
            Ok(known) => self.apply_dispatch(known, frame.data),
            Err(_) => Ok(GatewayEvent::Unhandled {
                name: name.clone(),
                data: frame.data,
            }),
        };
        match event {
            Ok(event) => self.emit(&event),
            Err(err) => warn!(client = %self.inner.id, event = %name, error = %err, "malformed dispatch"),
        }
    }

    /// Update session and cache for `name` and build its notification.
    fn apply_dispatch(&self, name: EventName, data: Value) -> ProtoResult<GatewayEvent> {
        let cache = &self.inner.cache;
        let event = match name {
            EventName::Ready => {
                let ready: cord_proto::Ready = decode(data)?;
                info!(client = %self.inner.id, session_id = %ready.session_id, guilds = ready.guilds.len(), "session ready");
                self.inner.session.lock().mark_ready(ready.session_id.clone());
                cache
                    .write()
                    .replace_all(ready.user.clone(), ready.guilds.clone());
                GatewayEvent::Ready(Box::new(ready))
            }
            EventName::Resumed => {
                info!(client = %self.inner.id, "session resumed");
                self.inner.session.lock().mark_resumed();
                GatewayEvent::Resumed
            }
            EventName::GuildCreate => {
                let guild: cord_proto::Guild = decode(data)?;
                cache.write().upsert_guild(guild.clone());
                GatewayEvent::GuildCreate(Box::new(guild))
            }
            EventName::GuildUpdate => {
                let guild: cord_proto::Guild = decode(data)?;
                let previous = cache.write().update_guild(guild.clone());
                GatewayEvent::GuildUpdate {
                    guild: Box::new(guild),
                    previous: previous.map(Box::new),
                }
            }
            EventName::GuildDelete => {
                let payload: GuildDeletePayload = decode(data)?;
                let previous = cache.write().remove_guild(&payload.id);
                GatewayEvent::GuildDelete {
                    guild_id: payload.id,
                    unavailable: payload.unavailable,
                    previous: previous.map(Box::new),
                }
            }
            EventName::ChannelCreate => {
                let channel: cord_proto::Channel = decode(data)?;
                cache.write().upsert_channel(channel.clone());
                GatewayEvent::ChannelCreate(channel)
            }
            EventName::ChannelUpdate => {
                let channel: cord_proto::Channel = decode(data)?;
                let previous = cache.write().upsert_channel(channel.clone());
                GatewayEvent::ChannelUpdate { channel, previous }
            }
            EventName::ChannelDelete => {
                let channel: cord_proto::Channel = decode(data)?;
                cache.write().remove_channel(&channel.id);
                GatewayEvent::ChannelDelete(channel)
            }
            EventName::GuildMemberAdd => {
                let member: cord_proto::GuildMember = decode(data)?;
                if let Some(guild_id) = member.guild_id.as_deref() {
                    cache.write().upsert_member(guild_id, member.clone());
                }
                GatewayEvent::GuildMemberAdd(member)
            }
            EventName::GuildMemberUpdate => {
                let member: cord_proto::GuildMember = decode(data)?;
                let previous = member
                    .guild_id
                    .as_deref()
                    .and_then(|guild_id| cache.write().upsert_member(guild_id, member.clone()));
                GatewayEvent::GuildMemberUpdate { member, previous }
            }
            EventName::GuildMemberRemove => {
                let removed: GuildMemberRemove = decode(data)?;
                let previous = cache
                    .write()
                    .remove_member(&removed.guild_id, &removed.user.id);
                GatewayEvent::GuildMemberRemove {
                    guild_id: removed.guild_id,
                    user: removed.user,
                    previous,
                }
            }
            EventName::GuildRoleCreate => {
                let GuildRoleEvent { guild_id, role } = decode(data)?;
                cache.write().upsert_role(&guild_id, role.clone());
                GatewayEvent::GuildRoleCreate { guild_id, role }
            }
            EventName::GuildRoleUpdate => {
                let GuildRoleEvent { guild_id, role } = decode(data)?;
                let previous = cache.write().upsert_role(&guild_id, role.clone());
                GatewayEvent::GuildRoleUpdate {
                    guild_id,
                    role,
                    previous,
                }
            }
            EventName::GuildRoleDelete => {
                let GuildRoleDelete { guild_id, role_id } = decode(data)?;
                let previous = cache.write().remove_role(&guild_id, &role_id);
                GatewayEvent::GuildRoleDelete {
                    guild_id,
                    role_id,
                    previous,
                }
            }
            EventName::PresenceUpdate => {
                let presence: cord_proto::PresenceUpdate = decode(data)?;
                cache.write().update_presence(&presence);
                GatewayEvent::PresenceUpdate(presence)
            }
            EventName::UserUpdate => {
                let user: cord_proto::User = decode(data)?;
                let previous = cache.write().update_user(&user);
                GatewayEvent::UserUpdate { user, previous }
            }
            other => GatewayEvent::Dispatch { name: other, data },
        };
        Ok(event)
    }

    async fn on_close(&self, code: u16, reason: String, was_clean: bool) {
        self.stop_heartbeat();
        self.inner.handshake_sent.store(false, Ordering::SeqCst);
        info!(client = %self.inner.id, code, reason = %reason, was_clean, "gateway connection lost");
        self.emit(&GatewayEvent::SocketClosed {
            code,
            reason: reason.clone(),
            was_clean,
        });

        if self.inner.shutdown.is_cancelled() {
            self.teardown(Outcome::Shutdown).await;
            return;
        }

        match CloseDisposition::classify(code) {
            CloseDisposition::Fatal => {
                error!(client = %self.inner.id, code, reason = %reason, "authentication failed, not reconnecting");
                self.inner.session.lock().reset();
                self.teardown(Outcome::AuthFailed { code, reason }).await;
            }
            CloseDisposition::Reconnect { resumable } => {
                if !resumable {
                    self.inner.session.lock().reset();
                }
                let Some(socket) = self.socket() else {
                    return;
                };
                self.inner.state.store(ConnectionState::Connecting);
                let id = self.inner.id;
                self.track(tokio::spawn(async move {
                    if let Err(err) = socket.reconnect().await {
                        debug!(client = %id, error = %err, "reconnect abandoned");
                    }
                }));
            }
        }
    }

    /// Send a heartbeat now. Returns `false` when there is no live connection.
    fn send_heartbeat(&self) -> bool {
        let now = Utc::now().timestamp_millis();
        let previous = self.inner.last_heartbeat_ms.swap(now, Ordering::SeqCst);
        let timestamp_ms = (previous > 0).then_some(previous);

        let frame = match OutboundFrame::heartbeat(timestamp_ms).to_json() {
            Ok(frame) => frame,
            Err(err) => {
                error!(client = %self.inner.id, error = %err, "failed to encode heartbeat");
                return true;
            }
        };
        if let Err(err) = self.send_raw(frame) {
            debug!(client = %self.inner.id, error = %err, "heartbeat not sent");
            return false;
        }
        self.emit(&GatewayEvent::HeartbeatSent { timestamp_ms });
        true
    }

    fn send_raw(&self, frame: String) -> GatewayResult<()> {
        let socket = self.socket().ok_or(ConnectionStateError::NotConnected)?;
        if self.inner.settings.debugging {
            debug!(client = %self.inner.id, frame = %frame, "gateway frame sent");
        }
        socket.send(frame)
    }

    /// Application frames wait until Identify or Resume has gone out on the
    /// current connection.
    fn send_app_frame(&self, frame: String) -> GatewayResult<()> {
        if self.state() == ConnectionState::Disconnected {
            return Err(ConnectionStateError::NotConnected.into());
        }
        {
            let mut pending = self.inner.pending.lock();
            if !self.inner.handshake_sent.load(Ordering::SeqCst) {
                pending.push(frame);
                return Ok(());
            }
        }
        self.send_raw(frame)
    }

    /// Ask for offline members of a guild (op 8). Results arrive as
    /// `GUILD_MEMBERS_CHUNK` dispatches.
    pub fn request_guild_members(
        &self,
        guild_id: impl Into<String>,
        query: impl Into<String>,
        limit: u32,
    ) -> GatewayResult<()> {
        let request = GuildMembersRequest {
            guild_id: guild_id.into(),
            query: query.into(),
            limit,
        };
        self.send_app_frame(OutboundFrame::request_guild_members(request).to_json()?)
    }

    /// Join, move or leave a voice channel (op 4).
    pub fn update_voice_state(
        &self,
        guild_id: impl Into<String>,
        channel_id: Option<String>,
        self_mute: bool,
        self_deaf: bool,
    ) -> GatewayResult<()> {
        let update = VoiceStateUpdate {
            guild_id: guild_id.into(),
            channel_id,
            self_mute,
            self_deaf,
        };
        self.send_app_frame(OutboundFrame::voice_state_update(update).to_json()?)
    }

    /// Update the bot's presence (op 3).
    pub fn update_status(&self, presence: Presence) -> GatewayResult<()> {
        self.send_app_frame(OutboundFrame::status_update(presence).to_json()?)
    }

    fn stop_heartbeat(&self) {
        if let Some(heartbeat) = self.inner.heartbeat.lock().take() {
            heartbeat.stop();
        }
    }

    async fn teardown(&self, outcome: Outcome) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.state.store(ConnectionState::Disconnected);
        self.inner.shutdown.cancel();
        self.stop_heartbeat();

        let socket = self.inner.socket.lock().take();
        if let Some(socket) = socket {
            socket.disconnect().await;
        }
        self.inner.rest.shutdown().await;
        self.inner.session.lock().reset();
        self.inner.pending.lock().clear();

        let hook = self.inner.on_teardown.lock().take();
        if let Some(hook) = hook {
            hook(self.inner.id);
        }
        info!(client = %self.inner.id, outcome = ?outcome, "gateway client shut down");
        self.inner.outcome.send_replace(Some(outcome));
    }

    /// Shut down for good: stop the heartbeat, close the socket, cancel any
    /// pending reconnect and stop the REST buckets. Idempotent. Once this
    /// returns no worker of this client is running.
    pub async fn disconnect(&self) {
        self.teardown(Outcome::Shutdown).await;
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Resolves once the client is permanently down. Yields
    /// [`GatewayError::Authentication`] if the server rejected the token.
    pub async fn closed(&self) -> GatewayResult<()> {
        let mut outcome = self.inner.outcome.subscribe();
        let outcome = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(Outcome::AuthFailed { code, reason }) => {
                Err(GatewayError::Authentication { code, reason })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn set_teardown_hook(&self, hook: TeardownHook) {
        *self.inner.on_teardown.lock() = Some(hook);
    }

    fn emit(&self, event: &GatewayEvent) {
        self.inner.hub.emit(self, event);
    }

    fn socket(&self) -> Option<Arc<GatewaySocket>> {
        self.inner.socket.lock().clone()
    }

    /// Register a handler under `name`, replacing any handler with that name.
    pub fn register_handler(&self, name: impl Into<String>, handler: Arc<dyn EventHandler>) -> bool {
        self.inner.hub.register(name, handler)
    }

    /// Remove the handler registered under `name`.
    pub fn unregister_handler(&self, name: &str) -> bool {
        self.inner.hub.unregister(name)
    }

    /// Names of registered handlers.
    pub fn handler_names(&self) -> Vec<String> {
        self.inner.hub.names()
    }

    /// Client id.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    /// Whether [`disconnect`](Self::disconnect) ran or the token was rejected.
    pub fn is_shut_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// Snapshot of the session.
    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    /// REST dispatcher sharing this client's token.
    pub fn rest(&self) -> &RestDispatcher {
        &self.inner.rest
    }

    /// Read the guild cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&GuildCache) -> R) -> R {
        f(&self.inner.cache.read())
    }

    /// Consecutive failed reconnect attempts on the current socket.
    pub fn reconnect_attempts(&self) -> u32 {
        self.socket().map_or(0, |socket| socket.reconnect_attempts())
    }

    /// Negotiated heartbeat interval, while a heartbeat is running.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.inner
            .heartbeat
            .lock()
            .as_ref()
            .filter(|heartbeat| heartbeat.is_running())
            .map(HeartbeatHandle::interval)
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> ProtoResult<T> {
    serde_json::from_value(data).map_err(|e| ProtoError::Decoding(e.to_string()))
}
