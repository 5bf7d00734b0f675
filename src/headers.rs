//! Parsing of the response headers the Mender API uses for protocol signals.
//!
//! - `Retry-After`: rate-limit hint, whole seconds
//! - `X-Request-Id`: correlation id echoed into errors
//! - `X-Total-Count`: total number of items behind a paginated listing
//! - `Location`: URL of a newly created resource

use http::HeaderMap;
use std::time::Duration;

/// Correlation id header name.
pub const REQUEST_ID: &str = "x-request-id";

/// Total count header name.
pub const TOTAL_COUNT: &str = "x-total-count";

/// Parses the `Retry-After` header as an integer number of seconds.
///
/// HTTP-date values and garbage yield `None`.
///
/// # Examples
///
/// ```
/// use mender_sdk::headers::retry_after;
/// use http::HeaderMap;
/// use std::time::Duration;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "60".parse().unwrap());
/// assert_eq!(retry_after(&headers), Some(Duration::from_secs(60)));
/// ```
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Returns the `X-Request-Id` header value.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID)?.to_str().ok()?;
    Some(value.to_string())
}

/// Parses the `X-Total-Count` header.
///
/// Header lookup is case-insensitive; non-numeric values yield `None`.
pub fn total_count(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(TOTAL_COUNT)?.to_str().ok()?;
    value.trim().parse().ok()
}

/// Extracts a resource id from a `Location` header value.
///
/// The id is the final path segment; a trailing slash is ignored.
///
/// # Examples
///
/// ```
/// use mender_sdk::headers::id_from_location;
///
/// assert_eq!(id_from_location("/deployments/abc-123"), "abc-123");
/// assert_eq!(id_from_location(""), "");
/// ```
pub fn id_from_location(location: &str) -> &str {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Returns the id of a created resource from the `Location` header.
///
/// An absent header yields an empty id.
pub fn location_id(headers: &HeaderMap) -> String {
    headers
        .get(http::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(|location| id_from_location(location).to_string())
        .unwrap_or_default()
}
