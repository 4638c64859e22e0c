//! Per-route request buckets and their pacing worker.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{RestError, RestResult};
use crate::global_rate_limit::GlobalRateLimit;
use crate::request::{Request, RequestCallback};
use crate::response::RestResponse;
use crate::route::BucketKey;
use crate::transport::{HttpRequest, HttpTransport};

/// Retry window for a 429 that carries no timing information at all.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Re-check interval while the head request is still marked in flight.
const BUSY_POLL: Duration = Duration::from_millis(50);

/// Everything a bucket worker needs to fire requests.
pub(crate) struct BucketContext {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) global: Arc<GlobalRateLimit>,
    pub(crate) base_url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) request_timeout: Duration,
    pub(crate) shutdown: CancellationToken,
}

#[derive(Debug, Default)]
struct BucketState {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    queue: VecDeque<Request>,
    disposed: bool,
}

/// What the pacing worker should do next.
#[derive(Debug)]
pub(crate) enum Step {
    /// Fire the head request.
    Fire(HttpRequest),
    /// Nothing may fire for this long.
    Wait(Duration),
    /// Queue drained, the bucket is finished.
    Dispose,
}

/// Point-in-time view of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSnapshot {
    /// Bucket identity.
    pub key: BucketKey,
    /// Last known `X-RateLimit-Limit`.
    pub limit: Option<u32>,
    /// Last known `X-RateLimit-Remaining`.
    pub remaining: Option<u32>,
    /// Time until the window resets, if one is pending.
    pub reset_in: Option<Duration>,
    /// Queued requests, including one in flight.
    pub queued: usize,
    /// Whether the head request is in flight.
    pub in_flight: bool,
    /// Whether the bucket has been retired.
    pub disposed: bool,
}

/// FIFO queue of requests sharing one (method, route) pair.
///
/// A single worker drains the queue, firing one request at a time. Once the
/// queue is empty the bucket disposes itself and refuses further work.
#[derive(Debug)]
pub struct Bucket {
    key: BucketKey,
    state: Mutex<BucketState>,
}

impl Bucket {
    /// Create an empty bucket.
    #[must_use]
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            state: Mutex::new(BucketState::default()),
        }
    }

    /// Bucket identity.
    pub const fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Append a request. A disposed bucket hands the request back.
    pub fn enqueue(&self, request: Request) -> Result<(), Request> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(request);
        }
        state.queue.push_back(request);
        Ok(())
    }

    /// Whether the bucket has been retired.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether no requests are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retire the bucket, dropping anything still queued. Returns the number dropped.
    pub fn dispose(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            state.disposed = true;
            state.queue.drain(..).count()
        };
        if dropped > 0 {
            debug!(bucket = %self.key, dropped, "bucket disposed with queued requests");
        }
        dropped
    }

    /// Current counters.
    pub fn snapshot(&self) -> BucketSnapshot {
        let state = self.state.lock();
        let now = Instant::now();
        BucketSnapshot {
            key: self.key.clone(),
            limit: state.limit,
            remaining: state.remaining,
            reset_in: state
                .reset_at
                .filter(|at| *at > now)
                .map(|at| at - now),
            queued: state.queue.len(),
            in_flight: state.queue.front().is_some_and(Request::in_progress),
            disposed: state.disposed,
        }
    }

    /// Decide the next pacing step, marking the head request in flight on `Fire`.
    pub(crate) fn next_step(&self, ctx: &BucketContext) -> Step {
        let mut state = self.state.lock();
        if state.disposed {
            return Step::Dispose;
        }
        if ctx.shutdown.is_cancelled() {
            state.disposed = true;
            return Step::Dispose;
        }

        if let Some(wait) = ctx.global.remaining() {
            return Step::Wait(wait);
        }

        let now = Instant::now();
        match state.reset_at {
            Some(at) if at > now && state.remaining == Some(0) => {
                return Step::Wait(at - now);
            }
            Some(at) if at <= now => {
                state.reset_at = None;
                state.remaining = state.limit;
            }
            None if state.remaining == Some(0) => {
                state.reset_at = Some(now + DEFAULT_RETRY_AFTER);
                return Step::Wait(DEFAULT_RETRY_AFTER);
            }
            _ => {}
        }

        let Some(head) = state.queue.front_mut() else {
            state.disposed = true;
            return Step::Dispose;
        };

        if head.in_progress() {
            return Step::Wait(BUSY_POLL);
        }

        head.mark_started();
        Step::Fire(head.to_http(&ctx.base_url, &ctx.headers))
    }

    fn apply_limits(&self, response: &RestResponse) {
        let headers = &response.rate_limit;
        let now = Instant::now();
        let mut state = self.state.lock();

        if headers.limit.is_some() {
            state.limit = headers.limit;
        }
        if headers.remaining.is_some() {
            state.remaining = headers.remaining;
        }
        if let Some(after) = headers.reset_after {
            state.reset_at = Some(now + after);
        }

        if response.is_rate_limited() && !headers.global {
            let retry_at = now + headers.retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
            state.remaining = Some(0);
            state.reset_at = Some(state.reset_at.map_or(retry_at, |at| at.max(retry_at)));
        }
    }

    fn pop_head(&self) -> Option<Request> {
        self.state.lock().queue.pop_front()
    }

    fn release_head(&self) {
        if let Some(head) = self.state.lock().queue.front_mut() {
            head.mark_idle();
        }
    }

    /// Apply the outcome of firing the head request.
    pub(crate) fn settle(&self, outcome: RestResult<RestResponse>, ctx: &BucketContext) {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                let request = self.pop_head();
                error!(
                    bucket = %self.key,
                    path = request.as_ref().map(Request::path).unwrap_or_default(),
                    error = %err,
                    "request failed, dropping"
                );
                return;
            }
        };

        self.apply_limits(&response);

        if response.rate_limit.global {
            ctx.global
                .reached(response.rate_limit.retry_after.unwrap_or(DEFAULT_RETRY_AFTER));
        }

        if response.is_success() {
            let callback = self.pop_head().and_then(|mut request| request.take_callback());
            if ctx.shutdown.is_cancelled() {
                return;
            }
            if let Some(callback) = callback {
                self.invoke(callback, response);
            }
        } else if response.is_rate_limited() {
            debug!(
                bucket = %self.key,
                global = response.rate_limit.global,
                retry_after_ms = response.rate_limit.retry_after.map(|d| d.as_millis() as u64),
                "rate limited, request stays queued"
            );
            self.release_head();
        } else {
            let request = self.pop_head();
            warn!(
                bucket = %self.key,
                path = request.as_ref().map(Request::path).unwrap_or_default(),
                status = response.status,
                body = %response.body,
                "request rejected, dropping"
            );
        }
    }

    fn invoke(&self, callback: RequestCallback, response: RestResponse) {
        if catch_unwind(AssertUnwindSafe(move || callback(response))).is_err() {
            error!(bucket = %self.key, "request callback panicked");
        }
    }

    /// Pacing worker. Runs until the queue drains or shutdown is signalled.
    pub(crate) async fn run(self: Arc<Self>, ctx: Arc<BucketContext>) {
        debug!(bucket = %self.key, "bucket worker started");

        loop {
            match self.next_step(&ctx) {
                Step::Dispose => break,
                Step::Wait(wait) => {
                    tokio::select! {
                        () = ctx.shutdown.cancelled() => break,
                        () = tokio::time::sleep(wait) => {}
                    }
                }
                Step::Fire(http) => {
                    let outcome = tokio::select! {
                        () = ctx.shutdown.cancelled() => break,
                        result = tokio::time::timeout(ctx.request_timeout, ctx.transport.execute(&http)) => {
                            result.unwrap_or(Err(RestError::Timeout(ctx.request_timeout)))
                        }
                    };
                    self.settle(outcome, &ctx);
                }
            }
        }

        self.dispose();
        debug!(bucket = %self.key, "bucket worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::RequestMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bucket() -> Bucket {
        Bucket::new(BucketKey::new(RequestMethod::Get, "/channels/1"))
    }

    fn request() -> Request {
        Request::new(RequestMethod::Get, "/channels/1", "/messages", None, None)
    }

    fn step(bucket: &Bucket, ctx: &BucketContext) -> Step {
        bucket.next_step(ctx)
    }

    struct NoTransport;

    impl HttpTransport for NoTransport {
        fn execute<'a>(
            &'a self,
            _request: &'a HttpRequest,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = RestResult<RestResponse>> + Send + 'a>>
        {
            Box::pin(async { Err(RestError::Transport("unused".to_string())) })
        }
    }

    fn context() -> BucketContext {
        BucketContext {
            transport: Arc::new(NoTransport),
            global: Arc::new(GlobalRateLimit::new()),
            base_url: "https://example.test".to_string(),
            headers: Vec::new(),
            request_timeout: Duration::from_secs(5),
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_disposes_and_refuses_work() {
        let bucket = bucket();
        let ctx = context();

        assert!(matches!(step(&bucket, &ctx), Step::Dispose));
        assert!(bucket.is_disposed());
        assert!(bucket.enqueue(request()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_marks_head_in_flight() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");

        match step(&bucket, &ctx) {
            Step::Fire(http) => assert_eq!(http.url, "https://example.test/channels/1/messages"),
            other => panic!("expected fire, got {other:?}"),
        }
        assert!(bucket.snapshot().in_flight);
        assert!(matches!(step(&bucket, &ctx), Step::Wait(BUSY_POLL)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_window_waits_until_reset() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        let response = RestResponse::new(
            200,
            [
                ("X-RateLimit-Limit", "5"),
                ("X-RateLimit-Remaining", "0"),
                ("X-RateLimit-Reset-After", "2"),
            ],
            "{}",
        );
        bucket.settle(Ok(response), &ctx);

        match step(&bucket, &ctx) {
            Step::Wait(wait) => assert_eq!(wait, Duration::from_secs(2)),
            other => panic!("expected wait, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        assert_eq!(bucket.snapshot().remaining, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_limit_blocks_firing() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");
        ctx.global.reached(Duration::from_secs(3));

        assert!(matches!(step(&bucket, &ctx), Step::Wait(_)));
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_request_stays_queued() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(429, [("Retry-After", "1")], "")),
            &ctx,
        );

        let snapshot = bucket.snapshot();
        assert_eq!(snapshot.queued, 1);
        assert!(!snapshot.in_flight);
        assert_eq!(snapshot.remaining, Some(0));
        assert_eq!(snapshot.reset_in, Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_with_remaining_header_honours_retry_after() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(
                429,
                [("Retry-After", "5"), ("X-RateLimit-Remaining", "0")],
                "",
            )),
            &ctx,
        );

        match step(&bucket, &ctx) {
            Step::Wait(wait) => assert_eq!(wait, Duration::from_secs(5)),
            other => panic!("expected wait, got {other:?}"),
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_keeps_later_reset() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(
                429,
                [
                    ("Retry-After", "1"),
                    ("X-RateLimit-Remaining", "0"),
                    ("X-RateLimit-Reset-After", "3"),
                ],
                "",
            )),
            &ctx,
        );

        assert_eq!(bucket.snapshot().reset_in, Some(Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_window_without_reset_waits_default() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(200, [("X-RateLimit-Remaining", "0")], "{}")),
            &ctx,
        );

        assert!(matches!(step(&bucket, &ctx), Step::Wait(DEFAULT_RETRY_AFTER)));
        tokio::time::advance(DEFAULT_RETRY_AFTER).await;
        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_disposes_instead_of_firing() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");
        ctx.shutdown.cancel();

        assert!(matches!(step(&bucket, &ctx), Step::Dispose));
        assert!(bucket.is_disposed());
        assert!(bucket.enqueue(request()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_429_sets_global_limit() {
        let bucket = bucket();
        let ctx = context();
        bucket.enqueue(request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(
                429,
                [("Retry-After", "4"), ("X-RateLimit-Global", "true")],
                "",
            )),
            &ctx,
        );

        assert!(ctx.global.is_active());
        assert_eq!(bucket.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_drops_without_callback() {
        let bucket = bucket();
        let ctx = context();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let request = Request::new(
            RequestMethod::Get,
            "/channels/1",
            "",
            None,
            Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        bucket.enqueue(request).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(
            Ok(RestResponse::new(403, std::iter::empty(), "Missing Access")),
            &ctx,
        );

        assert!(bucket.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_is_contained() {
        let bucket = bucket();
        let ctx = context();
        let request = Request::new(
            RequestMethod::Get,
            "/channels/1",
            "",
            None,
            Some(Box::new(|_| panic!("consumer bug"))),
        );
        bucket.enqueue(request).expect("open bucket");
        bucket.enqueue(self::request()).expect("open bucket");

        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
        bucket.settle(Ok(RestResponse::new(200, std::iter::empty(), "{}")), &ctx);

        assert_eq!(bucket.len(), 1);
        assert!(matches!(step(&bucket, &ctx), Step::Fire(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_drops_queue() {
        let bucket = bucket();
        bucket.enqueue(request()).expect("open bucket");
        bucket.enqueue(request()).expect("open bucket");

        assert_eq!(bucket.dispose(), 2);
        assert!(bucket.is_disposed());
        assert!(bucket.is_empty());
    }
}
