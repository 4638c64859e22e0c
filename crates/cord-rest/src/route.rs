//! Splitting request paths into bucket routes.

use std::fmt;

use crate::error::{RestError, RestResult};
use crate::method::RequestMethod;

/// Identity of a rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// HTTP method.
    pub method: RequestMethod,
    /// Route key, the first two path segments.
    pub route: String,
}

impl BucketKey {
    /// Create a bucket key.
    #[must_use]
    pub fn new(method: RequestMethod, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.route)
    }
}

/// Split an absolute resource path into `(route, endpoint)`.
///
/// The route is the first two segments (`/channels/123`), the endpoint is
/// whatever follows (`/messages`), or empty. Trailing slashes are trimmed from
/// both halves.
pub fn split_route(path: &str) -> RestResult<(String, String)> {
    if !path.starts_with('/') {
        return Err(RestError::InvalidPath(path.to_string()));
    }

    let parts: Vec<&str> = path.split('/').collect();
    let cut = parts.len().min(3);

    let route = parts[..cut].join("/").trim_end_matches('/').to_string();
    let endpoint = format!("/{}", parts[cut..].join("/"))
        .trim_end_matches('/')
        .to_string();

    Ok((route, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("/channels/123/messages", "/channels/123", "/messages" ; "resource with suffix")]
    #[test_case("/channels/123/messages/9/reactions", "/channels/123", "/messages/9/reactions" ; "deep suffix")]
    #[test_case("/guilds/456/bans", "/guilds/456", "/bans" ; "bans")]
    #[test_case("/guilds/456", "/guilds/456", "" ; "no suffix")]
    #[test_case("/gateway", "/gateway", "" ; "single segment")]
    #[test_case("/channels/123/messages/", "/channels/123", "/messages" ; "trailing slash")]
    fn test_split_route(path: &str, route: &str, endpoint: &str) {
        let (r, e) = split_route(path).expect("valid path");
        assert_eq!(r, route);
        assert_eq!(e, endpoint);
    }

    #[test]
    fn test_relative_path_rejected() {
        assert!(matches!(
            split_route("channels/1"),
            Err(RestError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::new(RequestMethod::Post, "/channels/1");
        assert_eq!(key.to_string(), "POST /channels/1");
    }

    proptest! {
        #[test]
        fn prop_route_and_endpoint_rebuild_path(
            segments in proptest::collection::vec("[a-z0-9]{1,8}", 1..6),
        ) {
            let path = format!("/{}", segments.join("/"));
            let (route, endpoint) = split_route(&path).expect("valid path");

            prop_assert_eq!(format!("{route}{endpoint}"), path);
            prop_assert!(route.matches('/').count() <= 2);
        }
    }
}
