//! Error types for the REST layer.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while submitting REST calls.
#[derive(Debug, Error)]
pub enum RestError {
    /// Network-level failure, no HTTP response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The route (or the whole service) is rate limited.
    #[error("rate limited on {route}")]
    RateLimited {
        /// Route key that was limited.
        route: String,
        /// How long the server asked us to wait.
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status.
    #[error("http {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Path does not start with `/`.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Dispatcher was shut down.
    #[error("dispatcher is shut down")]
    ShutDown,

    /// No tokio runtime to run bucket workers on.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The request was dropped without a successful response.
    #[error("request dropped before completing")]
    RequestDropped,
}

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;
