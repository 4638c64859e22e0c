//! A single queued REST call.

use std::fmt;

use serde_json::Value;
use tokio::time::Instant;

use crate::method::RequestMethod;
use crate::response::RestResponse;
use crate::transport::HttpRequest;

/// Callback invoked with the response of a successful call.
pub type RequestCallback = Box<dyn FnOnce(RestResponse) + Send + 'static>;

/// A REST call waiting in (or being fired by) a bucket.
pub struct Request {
    /// HTTP method.
    pub method: RequestMethod,
    /// Route key, e.g. `/channels/123`.
    pub route: String,
    /// Endpoint suffix, e.g. `/messages`.
    pub endpoint: String,
    /// Extra headers for this call only.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
    callback: Option<RequestCallback>,
    in_progress: bool,
    started_at: Option<Instant>,
}

impl Request {
    /// Create a request.
    pub fn new(
        method: RequestMethod,
        route: impl Into<String>,
        endpoint: impl Into<String>,
        body: Option<Value>,
        callback: Option<RequestCallback>,
    ) -> Self {
        Self {
            method,
            route: route.into(),
            endpoint: endpoint.into(),
            headers: Vec::new(),
            body,
            callback,
            in_progress: false,
            started_at: None,
        }
    }

    /// Attach a per-call header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Full path, route plus endpoint.
    pub fn path(&self) -> String {
        format!("{}{}", self.route, self.endpoint)
    }

    /// Absolute URL under `base`.
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }

    /// Whether the call is currently in flight.
    pub const fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// When the current (or last) attempt was fired.
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub(crate) fn mark_started(&mut self) {
        self.in_progress = true;
        self.started_at = Some(Instant::now());
    }

    pub(crate) fn mark_idle(&mut self) {
        self.in_progress = false;
    }

    pub(crate) fn take_callback(&mut self) -> Option<RequestCallback> {
        self.callback.take()
    }

    /// Resolve into a transport call with the dispatcher's common headers first.
    pub(crate) fn to_http(&self, base: &str, common: &[(String, String)]) -> HttpRequest {
        let mut headers = common.to_vec();
        headers.extend(self.headers.iter().cloned());

        HttpRequest {
            method: self.method,
            url: self.url(base),
            headers,
            body: self.body.as_ref().map(Value::to_string),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("route", &self.route)
            .field("endpoint", &self.endpoint)
            .field("has_body", &self.body.is_some())
            .field("has_callback", &self.callback.is_some())
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}
