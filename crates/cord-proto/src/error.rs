//! Error types for the cord-proto crate.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a frame or payload.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Opcode not known to this client.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Result type for protocol operations.
pub type ProtoResult<T> = Result<T, ProtoError>;
