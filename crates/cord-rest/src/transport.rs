//! HTTP transport seam.
//!
//! Buckets never talk to `reqwest` directly; they go through [`HttpTransport`]
//! so the pacing logic can be driven by a scripted transport in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::method::RequestMethod;
use crate::response::RestResponse;

/// A fully-resolved outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: RequestMethod,
    /// Absolute URL.
    pub url: String,
    /// Header pairs to send.
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: Option<String>,
}

/// Executes HTTP calls on behalf of the buckets.
pub trait HttpTransport: Send + Sync {
    /// Perform one HTTP call.
    ///
    /// Returns `Ok` for any received response, whatever its status. `Err` is
    /// reserved for failures where no response arrived.
    fn execute<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = RestResult<RestResponse>> + Send + 'a>>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport whose calls are abandoned after `timeout`.
    pub fn new(timeout: Duration) -> RestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RestError::Transport(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: &reqwest::Error) -> RestError {
        if err.is_timeout() {
            RestError::Timeout(self.timeout)
        } else {
            RestError::Transport(err.to_string())
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = RestResult<RestResponse>> + Send + 'a>> {
        Box::pin(async move {
            debug!(method = %request.method, url = %request.url, "sending http request");

            let mut builder = self
                .client
                .request(request.method.into(), request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(|e| self.map_error(&e))?;

            let status = response.status().as_u16();
            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(|e| self.map_error(&e))?;

            debug!(status, url = %request.url, "http response received");

            Ok(RestResponse::new(
                status,
                headers.iter().map(|(n, v)| (n.as_str(), v.as_str())),
                body,
            ))
        })
    }
}
