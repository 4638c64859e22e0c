//! Client settings.
//!
//! Settings load from a TOML file:
//!
//! ```toml
//! api_token = "..."
//! debugging = false
//!
//! [reconnect]
//! initial_delay_ms = 3000
//! escalated_delay_ms = 60000
//! escalate_after = 100
//! ```
//!
//! Everything except `api_token` has a default.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use cord_rest::RestConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::reconnect::ReconnectConfig;

/// Default REST API base.
pub const DEFAULT_API_BASE: &str = cord_rest::dispatcher::DEFAULT_API_BASE;
/// Default gateway protocol version.
pub const DEFAULT_GATEWAY_VERSION: u8 = 6;
/// Default member count above which guilds are sent without offline members.
pub const DEFAULT_LARGE_THRESHOLD: u32 = 50;
/// Default ceiling for a single REST call, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// `[reconnect]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Delay for early reconnect attempts.
    pub initial_delay_ms: u64,
    /// Delay after `escalate_after` attempts.
    pub escalated_delay_ms: u64,
    /// Attempts before escalating.
    pub escalate_after: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self::from(ReconnectConfig::default())
    }
}

impl From<ReconnectConfig> for ReconnectSettings {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            initial_delay_ms: config.initial_delay.as_millis() as u64,
            escalated_delay_ms: config.escalated_delay.as_millis() as u64,
            escalate_after: config.escalate_after,
        }
    }
}

impl From<ReconnectSettings> for ReconnectConfig {
    fn from(settings: ReconnectSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            escalated_delay: Duration::from_millis(settings.escalated_delay_ms),
            escalate_after: settings.escalate_after,
        }
    }
}

/// Settings for one gateway client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Bot token. Required.
    #[serde(default)]
    pub api_token: String,
    /// Log every frame sent and received.
    #[serde(default)]
    pub debugging: bool,
    /// Fixed gateway URL; when unset it is looked up with `GET /gateway`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// REST API base.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Gateway protocol version.
    #[serde(default = "default_gateway_version")]
    pub gateway_version: u8,
    /// Identify `large_threshold`.
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// Ceiling for a single REST call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Reconnect delays.
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

const fn default_gateway_version() -> u8 {
    DEFAULT_GATEWAY_VERSION
}

const fn default_large_threshold() -> u32 {
    DEFAULT_LARGE_THRESHOLD
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_token", &"<redacted>")
            .field("debugging", &self.debugging)
            .field("gateway_url", &self.gateway_url)
            .field("api_base", &self.api_base)
            .field("gateway_version", &self.gateway_version)
            .field("large_threshold", &self.large_threshold)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl ClientSettings {
    /// Settings with the given token and defaults for everything else.
    #[must_use]
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            debugging: false,
            gateway_url: None,
            api_base: default_api_base(),
            gateway_version: DEFAULT_GATEWAY_VERSION,
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            reconnect: ReconnectSettings::default(),
        }
    }

    /// Enable frame logging.
    #[must_use]
    pub const fn with_debugging(mut self, debugging: bool) -> Self {
        self.debugging = debugging;
        self
    }

    /// Skip the `GET /gateway` lookup and connect here.
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Set the REST API base.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the per-call REST timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the reconnect delays.
    #[must_use]
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config.into();
        self
    }

    /// Load settings from a TOML file.
    ///
    /// The token may be absent from the file; call [`validate`](Self::validate)
    /// once any overrides have been applied.
    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::Config(format!(
                "failed to read settings file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> GatewayResult<Self> {
        let settings: Self =
            toml::from_str(content).map_err(|e| GatewayError::Config(format!("invalid TOML: {e}")))?;
        settings.validate_options()?;
        Ok(settings)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> GatewayResult<String> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Check that the settings are usable, token included.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.api_token.trim().is_empty() {
            return Err(GatewayError::MissingCredentials);
        }
        self.validate_options()
    }

    fn validate_options(&self) -> GatewayResult<()> {
        Url::parse(&self.api_base)
            .map_err(|e| GatewayError::Config(format!("api_base is not a valid URL: {e}")))?;

        if let Some(url) = &self.gateway_url {
            let parsed = Url::parse(url)
                .map_err(|e| GatewayError::Config(format!("gateway_url is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(GatewayError::Config(
                    "gateway_url must start with ws:// or wss://".to_string(),
                ));
            }
        }

        if self.gateway_version == 0 {
            return Err(GatewayError::Config(
                "gateway_version must be greater than 0".to_string(),
            ));
        }

        if !(50..=250).contains(&self.large_threshold) {
            return Err(GatewayError::Config(
                "large_threshold must be between 50 and 250".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(GatewayError::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Ceiling for a single REST call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reconnect delays.
    #[must_use]
    pub fn reconnect_config(&self) -> ReconnectConfig {
        self.reconnect.into()
    }

    /// Settings for the REST dispatcher.
    #[must_use]
    pub fn rest_config(&self) -> RestConfig {
        RestConfig::default()
            .with_base_url(self.api_base.clone())
            .with_request_timeout(self.request_timeout())
    }

    /// A commented sample file.
    #[must_use]
    pub fn sample_toml() -> String {
        format!(
            r#"# cord client settings

# Bot token. May also be supplied through CORD_API_TOKEN.
api_token = ""

# Log every gateway frame.
debugging = false

# Fixed gateway URL. When unset it is looked up through the REST API.
# gateway_url = "wss://gateway.discord.gg"

api_base = "{DEFAULT_API_BASE}"
gateway_version = {DEFAULT_GATEWAY_VERSION}
large_threshold = {DEFAULT_LARGE_THRESHOLD}
request_timeout_ms = {DEFAULT_REQUEST_TIMEOUT_MS}

[reconnect]
initial_delay_ms = 3000
escalated_delay_ms = 60000
escalate_after = 100
"#
        )
    }
}
