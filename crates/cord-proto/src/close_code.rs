//! WebSocket close codes and how the client reacts to them.

/// Normal closure.
pub const NORMAL: u16 = 1000;
/// Endpoint going away.
pub const GOING_AWAY: u16 = 1001;
/// Close frame carried no status code.
pub const NO_STATUS: u16 = 1005;
/// No close frame was received (transport dropped).
pub const ABNORMAL: u16 = 1006;
/// Client-initiated close that keeps the session resumable.
pub const RECONNECT_REQUESTED: u16 = 4000;
/// Server rejected the token.
pub const AUTHENTICATION_FAILED: u16 = 4004;
/// Resume carried a sequence the server does not know.
pub const INVALID_SEQUENCE: u16 = 4007;
/// Session expired server-side.
pub const SESSION_TIMED_OUT: u16 = 4009;

/// What a close code means for the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Credentials rejected: disconnect permanently, never retry.
    Fatal,
    /// Reconnect; `resumable` is false when the session must be discarded.
    Reconnect {
        /// Whether the recorded session may be resumed.
        resumable: bool,
    },
}

impl CloseDisposition {
    /// Classify a close code.
    #[must_use]
    pub const fn classify(code: u16) -> Self {
        match code {
            AUTHENTICATION_FAILED => Self::Fatal,
            INVALID_SEQUENCE | SESSION_TIMED_OUT => Self::Reconnect { resumable: false },
            _ => Self::Reconnect { resumable: true },
        }
    }
}
