//! HTTP responses and rate-limit header parsing.

use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RestError, RestResult};

/// Status code the server uses to signal a rate limit.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Rate-limit information carried on a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit`.
    pub limit: Option<u32>,
    /// `X-RateLimit-Remaining`.
    pub remaining: Option<u32>,
    /// Time until the bucket resets, from `X-RateLimit-Reset-After` or `X-RateLimit-Reset`.
    pub reset_after: Option<Duration>,
    /// `Retry-After`.
    pub retry_after: Option<Duration>,
    /// `X-RateLimit-Global: true`.
    pub global: bool,
}

impl RateLimitHeaders {
    /// Parse the rate-limit headers out of raw `(name, value)` pairs.
    ///
    /// Header names are matched case-insensitively; malformed values are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut headers = Self::default();
        let mut reset_at: Option<f64> = None;

        for (name, value) in pairs {
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "x-ratelimit-limit" => headers.limit = value.parse().ok(),
                "x-ratelimit-remaining" => headers.remaining = value.parse().ok(),
                "x-ratelimit-reset-after" => headers.reset_after = parse_seconds(value),
                "x-ratelimit-reset" => reset_at = value.parse().ok(),
                "retry-after" => headers.retry_after = parse_seconds(value),
                "x-ratelimit-global" => headers.global = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if headers.reset_after.is_none() {
            if let Some(epoch_secs) = reset_at {
                let now = Utc::now().timestamp_millis() as f64 / 1000.0;
                headers.reset_after = Some(Duration::from_secs_f64((epoch_secs - now).max(0.0)));
            }
        }

        headers
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status.
    pub status: u16,
    /// Parsed rate-limit headers.
    pub rate_limit: RateLimitHeaders,
    /// Raw body text.
    pub body: String,
}

impl RestResponse {
    /// Build a response from a status, raw header pairs and a body.
    ///
    /// A `"global": true` flag in a JSON body also marks the limit as global,
    /// and the body's `retry_after` fills in a missing `Retry-After` header.
    pub fn new<'a, I>(status: u16, headers: I, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let body = body.into();
        let mut rate_limit = RateLimitHeaders::from_pairs(headers);

        if status == TOO_MANY_REQUESTS {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if value.get("global").and_then(Value::as_bool) == Some(true) {
                    rate_limit.global = true;
                }
                if rate_limit.retry_after.is_none() {
                    rate_limit.retry_after = value
                        .get("retry_after")
                        .and_then(Value::as_f64)
                        .filter(|secs| secs.is_finite() && *secs >= 0.0)
                        .map(Duration::from_secs_f64);
                }
            }
        }

        Self {
            status,
            rate_limit,
            body,
        }
    }

    /// 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// 429 status.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        self.status == TOO_MANY_REQUESTS
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| RestError::Decode(e.to_string()))
    }
}
