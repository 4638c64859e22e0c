//! Dispatcher pacing tests.
//!
//! Drives the bucket workers through a scripted transport on paused tokio
//! time, so rate-limit windows elapse instantly but in order.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cord_rest::{
    GlobalRateLimit, HttpRequest, HttpTransport, RequestCallback, RequestMethod, RestConfig,
    RestDispatcher, RestError, RestResponse, RestResult,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// Test Helpers - Scripted Transport
// ============================================================================

type Responder = dyn Fn(&HttpRequest, usize) -> RestResult<RestResponse> + Send + Sync;

/// One recorded call: URL and the instant it started.
#[derive(Debug, Clone)]
struct Call {
    url: String,
    at: Instant,
}

/// Transport that answers from a closure after a fixed latency.
struct ScriptedTransport {
    latency: Duration,
    responder: Box<Responder>,
    calls: Mutex<Vec<Call>>,
    per_url: Mutex<HashMap<String, usize>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    fn new(
        latency: Duration,
        responder: impl Fn(&HttpRequest, usize) -> RestResult<RestResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            latency,
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            per_url: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight: Mutex::new(HashMap::new()),
        })
    }

    fn ok(latency: Duration) -> Arc<Self> {
        Self::new(latency, |_, _| Ok(ok_response("{}")))
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn calls_to(&self, suffix: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.url.ends_with(suffix))
            .collect()
    }

    fn max_in_flight(&self, url_suffix: &str) -> usize {
        self.max_in_flight
            .lock()
            .iter()
            .filter(|(url, _)| url.ends_with(url_suffix))
            .map(|(_, n)| *n)
            .max()
            .unwrap_or(0)
    }
}

impl HttpTransport for ScriptedTransport {
    fn execute<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = RestResult<RestResponse>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = {
                let mut per_url = self.per_url.lock();
                let n = per_url.entry(request.url.clone()).or_default();
                *n += 1;
                *n
            };
            self.calls.lock().push(Call {
                url: request.url.clone(),
                at: Instant::now(),
            });
            {
                let mut in_flight = self.in_flight.lock();
                let n = in_flight.entry(request.url.clone()).or_default();
                *n += 1;
                let mut max = self.max_in_flight.lock();
                let peak = max.entry(request.url.clone()).or_default();
                *peak = (*peak).max(*n);
            }

            tokio::time::sleep(self.latency).await;

            if let Some(n) = self.in_flight.lock().get_mut(&request.url) {
                *n -= 1;
            }
            (self.responder)(request, attempt)
        })
    }
}

fn ok_response(body: &str) -> RestResponse {
    RestResponse::new(200, std::iter::empty(), body)
}

fn dispatcher(transport: Arc<ScriptedTransport>) -> RestDispatcher {
    dispatcher_with_global(transport, Arc::new(GlobalRateLimit::new()))
}

fn dispatcher_with_global(
    transport: Arc<ScriptedTransport>,
    global: Arc<GlobalRateLimit>,
) -> RestDispatcher {
    RestDispatcher::with_transport(
        "secret",
        RestConfig::default().with_base_url("https://api.test/v6"),
        transport,
        global,
    )
}

fn tagged(tx: &mpsc::UnboundedSender<usize>, tag: usize) -> RequestCallback {
    let tx = tx.clone();
    Box::new(move |_| {
        let _ = tx.send(tag);
    })
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<usize>, n: usize) -> Vec<usize> {
    let mut seen = Vec::with_capacity(n);
    for _ in 0..n {
        seen.push(rx.recv().await.expect("callback fired"));
    }
    seen
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_bucket_is_fifo_with_one_call_in_flight() {
    let transport = ScriptedTransport::ok(Duration::from_millis(20));
    let rest = dispatcher(Arc::clone(&transport));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for tag in 0..6 {
        rest.do_request(
            "/channels/123/messages",
            RequestMethod::Post,
            Some(json!({ "content": tag })),
            Some(tagged(&tx, tag)),
        )
        .expect("queued");
    }

    assert_eq!(collect(&mut rx, 6).await, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(transport.max_in_flight("/channels/123/messages"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_two_routes_get_independent_buckets() {
    let transport = ScriptedTransport::ok(Duration::from_millis(100));
    let rest = dispatcher(Arc::clone(&transport));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();

    rest.do_request("/channels/123/messages", RequestMethod::Post, None, Some(tagged(&tx, 1)))
        .expect("queued");
    rest.do_request("/channels/123/messages", RequestMethod::Post, None, Some(tagged(&tx, 2)))
        .expect("queued");
    rest.do_request("/guilds/456/bans", RequestMethod::Post, None, Some(tagged(&tx, 3)))
        .expect("queued");

    assert_eq!(rest.bucket_count(), 2);

    let mut seen = collect(&mut rx, 3).await;
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3]);

    let messages = transport.calls_to("/messages");
    let bans = transport.calls_to("/bans");
    assert_eq!(messages.len(), 2);
    assert_eq!(bans.len(), 1);

    // The ban call ran alongside the first message call, not after both.
    assert!(bans[0].at - start < Duration::from_millis(100));
    assert!(messages[1].at - messages[0].at >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_methods_do_not_share_buckets() {
    let transport = ScriptedTransport::ok(Duration::from_millis(10));
    let rest = dispatcher(transport);

    rest.do_request("/channels/1", RequestMethod::Get, None, None).expect("queued");
    rest.do_request("/channels/1", RequestMethod::Patch, None, None).expect("queued");

    assert_eq!(rest.bucket_count(), 2);
    assert!(rest.bucket_snapshot(RequestMethod::Get, "/channels/1/x").is_some());
}

// ============================================================================
// Rate-limit windows
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_exhausted_bucket_waits_for_reset() {
    let transport = ScriptedTransport::new(Duration::ZERO, |_, _| {
        Ok(RestResponse::new(
            200,
            [
                ("X-RateLimit-Limit", "1"),
                ("X-RateLimit-Remaining", "0"),
                ("X-RateLimit-Reset-After", "3"),
            ],
            "{}",
        ))
    });
    let rest = dispatcher(Arc::clone(&transport));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for tag in 0..3 {
        rest.do_request("/channels/9/messages", RequestMethod::Post, None, Some(tagged(&tx, tag)))
            .expect("queued");
    }
    assert_eq!(collect(&mut rx, 3).await, vec![0, 1, 2]);

    let calls = transport.calls();
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(3));
    assert!(calls[2].at - calls[1].at >= Duration::from_secs(3));
    // Fires again as soon as the window reopens.
    assert!(calls[1].at - calls[0].at < Duration::from_millis(3_100));
}

#[tokio::test(start_paused = true)]
async fn test_global_limit_suspends_every_bucket() {
    let transport = ScriptedTransport::ok(Duration::ZERO);
    let global = Arc::new(GlobalRateLimit::new());
    let rest = dispatcher_with_global(Arc::clone(&transport), Arc::clone(&global));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();

    global.reached(Duration::from_secs(2));

    rest.do_request("/channels/1/messages", RequestMethod::Post, None, Some(tagged(&tx, 1)))
        .expect("queued");
    rest.do_request("/guilds/2/members", RequestMethod::Get, None, Some(tagged(&tx, 2)))
        .expect("queued");

    collect(&mut rx, 2).await;
    for call in transport.calls() {
        assert!(call.at - start >= Duration::from_secs(2), "{} fired early", call.url);
    }
}

#[tokio::test(start_paused = true)]
async fn test_global_429_pauses_until_retry_after() {
    let transport = ScriptedTransport::new(Duration::ZERO, |request, attempt| {
        if request.url.ends_with("/messages") && attempt == 1 {
            Ok(RestResponse::new(
                429,
                [("Retry-After", "2"), ("X-RateLimit-Global", "true")],
                r#"{"message": "You are being rate limited.", "retry_after": 2, "global": true}"#,
            ))
        } else {
            Ok(ok_response("{}"))
        }
    });
    let rest = dispatcher(Arc::clone(&transport));

    rest.fetch::<Value>("/channels/1/messages", RequestMethod::Post, None)
        .await
        .expect("retried after global window");
    assert!(!rest.global_rate_limit().is_active());

    let calls = transport.calls_to("/messages");
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_request_is_retried() {
    let transport = ScriptedTransport::new(Duration::ZERO, |_, attempt| {
        if attempt == 1 {
            Ok(RestResponse::new(429, [("Retry-After", "0.5")], ""))
        } else {
            Ok(ok_response(r#"{"id": "42"}"#))
        }
    });
    let rest = dispatcher(Arc::clone(&transport));

    let body: Value = rest
        .fetch("/channels/1/messages", RequestMethod::Post, Some(json!({"content": "hi"})))
        .await
        .expect("second attempt succeeds");

    assert_eq!(body["id"], "42");
    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at - calls[0].at >= Duration::from_millis(500));
}

// ============================================================================
// Failure policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_error_status_drops_request_and_bucket_continues() {
    let transport = ScriptedTransport::new(Duration::ZERO, |request, _| {
        if request.body.as_deref() == Some(r#"{"bad":true}"#) {
            Ok(RestResponse::new(400, std::iter::empty(), r#"{"code": 50035}"#))
        } else {
            Ok(ok_response("{}"))
        }
    });
    let rest = dispatcher(Arc::clone(&transport));

    let failed = rest.fetch::<Value>(
        "/channels/1/messages",
        RequestMethod::Post,
        Some(json!({"bad": true})),
    );
    let ok = rest.fetch::<Value>("/channels/1/messages", RequestMethod::Post, None);
    let (failed, ok) = tokio::join!(failed, ok);

    assert!(matches!(failed, Err(RestError::RequestDropped)));
    assert!(ok.is_ok());
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_not_retried() {
    let transport = ScriptedTransport::new(Duration::ZERO, |_, _| {
        Err(RestError::Transport("connection reset".to_string()))
    });
    let rest = dispatcher(Arc::clone(&transport));

    let result = rest
        .fetch::<Value>("/gateway", RequestMethod::Get, None)
        .await;

    assert!(matches!(result, Err(RestError::RequestDropped)));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_call_times_out() {
    let transport = ScriptedTransport::ok(Duration::from_secs(30));
    let rest = RestDispatcher::with_transport(
        "secret",
        RestConfig::default().with_request_timeout(Duration::from_secs(5)),
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        Arc::new(GlobalRateLimit::new()),
    );
    let start = Instant::now();

    let result = rest
        .fetch::<Value>("/gateway", RequestMethod::Get, None)
        .await;

    assert!(matches!(result, Err(RestError::RequestDropped)));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_callback_does_not_stall_bucket() {
    let transport = ScriptedTransport::ok(Duration::ZERO);
    let rest = dispatcher(transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    rest.do_request(
        "/channels/1/messages",
        RequestMethod::Post,
        None,
        Some(Box::new(|_| panic!("consumer bug"))),
    )
    .expect("queued");
    rest.do_request("/channels/1/messages", RequestMethod::Post, None, Some(tagged(&tx, 7)))
        .expect("queued");

    assert_eq!(collect(&mut rx, 1).await, vec![7]);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_drained_bucket_is_replaced_on_next_request() {
    let transport = ScriptedTransport::ok(Duration::ZERO);
    let rest = dispatcher(Arc::clone(&transport));

    rest.fetch::<Value>("/channels/1/messages", RequestMethod::Get, None)
        .await
        .expect("first");

    // Let the worker observe its empty queue.
    while rest.bucket_count() > 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    rest.fetch::<Value>("/channels/1/messages", RequestMethod::Get, None)
        .await
        .expect("second");
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_workers_and_callbacks() {
    let transport = ScriptedTransport::ok(Duration::from_secs(1));
    let rest = dispatcher(Arc::clone(&transport));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for tag in 0..4 {
        rest.do_request("/channels/1/messages", RequestMethod::Post, None, Some(tagged(&tx, tag)))
            .expect("queued");
    }
    drop(tx);
    tokio::task::yield_now().await;

    rest.shutdown().await;
    assert_eq!(rest.bucket_count(), 0);
    assert!(rest.is_shut_down());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.recv().await.is_none(), "no callback after shutdown");
    assert!(transport.calls().len() <= 1);

    let late = rest.do_request("/channels/1/messages", RequestMethod::Post, None, None);
    assert!(matches!(late, Err(RestError::ShutDown)));
}

#[tokio::test(start_paused = true)]
async fn test_authorization_header_sent() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let transport = ScriptedTransport::new(Duration::ZERO, move |request, _| {
        record.lock().extend(request.headers.clone());
        Ok(ok_response("{}"))
    });
    let rest = dispatcher(transport);

    rest.fetch::<Value>("/users/@me", RequestMethod::Get, None)
        .await
        .expect("fetched");

    let headers = seen.lock().clone();
    assert!(headers.contains(&("Authorization".to_string(), "Bot secret".to_string())));
    assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));
}
