//! Routes REST calls into per-route buckets.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bucket::{Bucket, BucketContext, BucketSnapshot};
use crate::error::{RestError, RestResult};
use crate::global_rate_limit::GlobalRateLimit;
use crate::method::RequestMethod;
use crate::request::{Request, RequestCallback};
use crate::response::RestResponse;
use crate::route::{BucketKey, split_route};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v6";

/// Default ceiling for a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// API base URL that resource paths are appended to.
    pub base_url: String,
    /// Ceiling for a single HTTP call.
    pub request_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("DiscordBot (cord, {})", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RestConfig {
    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

struct ActiveBucket {
    bucket: Arc<Bucket>,
    worker: JoinHandle<()>,
}

struct DispatcherInner {
    context: Arc<BucketContext>,
    buckets: Mutex<HashMap<BucketKey, ActiveBucket>>,
}

impl DispatcherInner {
    /// Run a bucket worker, then drop its map entry unless a newer bucket
    /// has taken the key.
    async fn work(inner: Weak<Self>, bucket: Arc<Bucket>, context: Arc<BucketContext>) {
        Arc::clone(&bucket).run(context).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut buckets = inner.buckets.lock();
        if buckets
            .get(bucket.key())
            .is_some_and(|active| Arc::ptr_eq(&active.bucket, &bucket))
        {
            buckets.remove(bucket.key());
            debug!(bucket = %bucket.key(), "bucket removed");
        }
    }
}

/// Accepts REST calls and paces them per (method, route).
///
/// Cloning is cheap; clones share buckets and shutdown state.
#[derive(Clone)]
pub struct RestDispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for RestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDispatcher")
            .field("base_url", &self.inner.context.base_url)
            .field("buckets", &self.bucket_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl RestDispatcher {
    /// Create a dispatcher that talks HTTP through `reqwest` and shares the
    /// process-wide global limit.
    pub fn new(token: &str, config: RestConfig) -> RestResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(
            token,
            config,
            Arc::new(transport),
            GlobalRateLimit::process(),
        ))
    }

    /// Create a dispatcher with an explicit transport and global limit.
    pub fn with_transport(
        token: &str,
        config: RestConfig,
        transport: Arc<dyn HttpTransport>,
        global: Arc<GlobalRateLimit>,
    ) -> Self {
        let headers = vec![
            ("Authorization".to_string(), format!("Bot {token}")),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), config.user_agent.clone()),
        ];

        let context = BucketContext {
            transport,
            global,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers,
            request_timeout: config.request_timeout,
            shutdown: CancellationToken::new(),
        };

        Self {
            inner: Arc::new(DispatcherInner {
                context: Arc::new(context),
                buckets: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue a call. Returns once the request is enqueued; `callback` runs
    /// later with the response if the call succeeds.
    ///
    /// Must be called from within a tokio runtime.
    pub fn do_request(
        &self,
        path: &str,
        method: RequestMethod,
        body: Option<Value>,
        callback: Option<RequestCallback>,
    ) -> RestResult<()> {
        if self.is_shut_down() {
            return Err(RestError::ShutDown);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RestError::NoRuntime)?;

        let (route, endpoint) = split_route(path)?;
        let key = BucketKey::new(method, route.clone());
        let request = Request::new(method, route, endpoint, body, callback);

        let mut buckets = self.inner.buckets.lock();
        if self.is_shut_down() {
            return Err(RestError::ShutDown);
        }

        let request = match buckets.get(&key) {
            Some(active) => match active.bucket.enqueue(request) {
                Ok(()) => {
                    debug!(bucket = %key, "request queued");
                    return Ok(());
                }
                Err(request) => request,
            },
            None => request,
        };

        let bucket = Arc::new(Bucket::new(key.clone()));
        if bucket.enqueue(request).is_err() {
            return Err(RestError::RequestDropped);
        }
        let worker = runtime.spawn(DispatcherInner::work(
            Arc::downgrade(&self.inner),
            Arc::clone(&bucket),
            Arc::clone(&self.inner.context),
        ));
        debug!(bucket = %key, "bucket created");
        buckets.insert(key, ActiveBucket { bucket, worker });

        Ok(())
    }

    /// Queue a call with a serializable body.
    pub fn do_request_json<B: Serialize>(
        &self,
        path: &str,
        method: RequestMethod,
        body: &B,
        callback: Option<RequestCallback>,
    ) -> RestResult<()> {
        let body = serde_json::to_value(body).map_err(|e| RestError::Decode(e.to_string()))?;
        self.do_request(path, method, Some(body), callback)
    }

    /// Queue a call and wait for its decoded response.
    ///
    /// Resolves to [`RestError::RequestDropped`] if the bucket drops the call
    /// (transport failure, non-429 error status, shutdown).
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        method: RequestMethod,
        body: Option<Value>,
    ) -> RestResult<T> {
        let (tx, rx) = oneshot::channel::<RestResponse>();
        let callback: RequestCallback = Box::new(move |response| {
            let _ = tx.send(response);
        });
        self.do_request(path, method, body, Some(callback))?;

        let response = rx.await.map_err(|_| RestError::RequestDropped)?;
        response.json()
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.inner
            .buckets
            .lock()
            .values()
            .filter(|active| !active.bucket.is_disposed())
            .count()
    }

    /// Counters for the bucket serving `method` on `path`, if it is live.
    pub fn bucket_snapshot(&self, method: RequestMethod, path: &str) -> Option<BucketSnapshot> {
        let (route, _) = split_route(path).ok()?;
        let key = BucketKey::new(method, route);
        self.inner
            .buckets
            .lock()
            .get(&key)
            .map(|active| active.bucket.snapshot())
            .filter(|snapshot| !snapshot.disposed)
    }

    /// The global limit this dispatcher honours.
    pub fn global_rate_limit(&self) -> &Arc<GlobalRateLimit> {
        &self.inner.context.global
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.context.shutdown.is_cancelled()
    }

    /// Stop every bucket worker and drop queued requests.
    ///
    /// Idempotent. Once this returns no worker is running and no callback
    /// will fire.
    pub async fn shutdown(&self) {
        self.inner.context.shutdown.cancel();

        let drained: Vec<ActiveBucket> = {
            let mut buckets = self.inner.buckets.lock();
            buckets.drain().map(|(_, active)| active).collect()
        };
        if drained.is_empty() {
            return;
        }

        let mut dropped = 0;
        for active in &drained {
            dropped += active.bucket.dispose();
        }
        for active in drained {
            let _ = active.worker.await;
        }

        info!(dropped, "rest dispatcher shut down");
    }
}
