//! Error types for the gateway client.

use cord_proto::ProtoError;
use cord_rest::RestError;
use thiserror::Error;

/// An operation was attempted in a connection state that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionStateError {
    /// A connection attempt is already outstanding.
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    /// The socket is already open.
    #[error("already connected")]
    AlreadyConnected,

    /// The socket was closed for good and cannot reconnect.
    #[error("cannot reconnect a socket that has been closed")]
    ReconnectOnClosedSocket,

    /// No connection is open.
    #[error("not connected")]
    NotConnected,
}

/// Errors that can occur in gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API token configured.
    #[error("an API token is required")]
    MissingCredentials,

    /// Invalid settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation not valid in the current connection state.
    #[error(transparent)]
    ConnectionState(#[from] ConnectionStateError),

    /// The server rejected the token.
    #[error("authentication failed ({code}): {reason}")]
    Authentication {
        /// Close code sent by the server.
        code: u16,
        /// Close reason sent by the server.
        reason: String,
    },

    /// WebSocket transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    /// REST call failed.
    #[error("rest error: {0}")]
    Rest(#[from] RestError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
