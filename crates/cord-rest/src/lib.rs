//! # cord-rest
//!
//! REST submission layer that respects the remote service's rate limits.
//!
//! Calls are split into a route key and an endpoint suffix and queued on a
//! per-(method, route) [`Bucket`]. Each bucket runs its own pacing worker that
//! fires one request at a time, waits out the bucket's reset window when its
//! remaining count hits zero, and stops firing entirely while the
//! [`GlobalRateLimit`] cutoff is active.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
pub mod dispatcher;
pub mod error;
pub mod global_rate_limit;
pub mod method;
pub mod request;
pub mod response;
pub mod route;
pub mod transport;

pub use bucket::{Bucket, BucketSnapshot};
pub use dispatcher::{RestConfig, RestDispatcher};
pub use error::{RestError, RestResult};
pub use global_rate_limit::GlobalRateLimit;
pub use method::RequestMethod;
pub use request::{Request, RequestCallback};
pub use response::{RateLimitHeaders, RestResponse};
pub use route::{BucketKey, split_route};
pub use transport::{HttpRequest, HttpTransport, ReqwestTransport};
