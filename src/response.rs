//! Raw successful responses.
//!
//! The executor hands back a [`RawResponse`] and leaves the mapping into
//! domain types to the caller, which keeps the transport free of any
//! knowledge about inventory or deployments payloads.

use crate::{headers, Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A successful (2xx) HTTP response.
///
/// # Examples
///
/// ```no_run
/// use mender_sdk::Client;
///
/// # async fn example() -> Result<(), mender_sdk::Error> {
/// let client = Client::builder().token("jwt").build()?;
///
/// let response = client.get("/api/management/v2/inventory/devices", &[]).await?;
/// let devices: Vec<serde_json::Value> = response.json()?;
///
/// println!("{} devices in {:?}", devices.len(), response.latency);
/// println!("total: {:?}", response.total_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub body: Vec<u8>,

    /// The total latency of the request, including all retry attempts.
    pub latency: Duration,

    /// The number of attempts made to complete this request.
    ///
    /// This will be `1` for requests that succeeded on the first try.
    pub attempts: usize,
}

impl RawResponse {
    /// Creates a new `RawResponse`.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            latency,
            attempts,
        }
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialization`] with the raw body attached when the
    /// payload does not match `T`.
    pub fn json<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::error!(
                error = %e,
                status = self.status.as_u16(),
                "Failed to deserialize response"
            );
            Error::Deserialization {
                raw_response: self.text(),
                serde_error: e.to_string(),
                status: self.status,
            }
        })
    }

    /// Deserializes the body as JSON, treating an empty body as `None`.
    pub fn json_opt<T>(&self) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        self.json().map(Some)
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Consumes the response and returns the body bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the id of a created resource, taken from the `Location` header.
    pub fn location_id(&self) -> String {
        headers::location_id(&self.headers)
    }

    /// Returns the `X-Total-Count` header value.
    pub fn total_count(&self) -> Option<u64> {
        headers::total_count(&self.headers)
    }

    /// Returns the `X-Request-Id` header value.
    pub fn request_id(&self) -> Option<String> {
        headers::request_id(&self.headers)
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(body: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("location", HeaderValue::from_static("/deployments/abc-123"));
        headers.insert("x-total-count", HeaderValue::from_static("3"));
        RawResponse::new(
            StatusCode::OK,
            headers,
            body.as_bytes().to_vec(),
            Duration::from_millis(5),
            1,
        )
    }

    #[test]
    fn test_json_and_headers() {
        let response = response(r#"["a","b"]"#);
        let items: Vec<String> = response.json().unwrap();

        assert_eq!(items, vec!["a", "b"]);
        assert_eq!(response.location_id(), "abc-123");
        assert_eq!(response.total_count(), Some(3));
        assert!(!response.was_retried());
    }

    #[test]
    fn test_json_error_keeps_raw_body() {
        let err = response("not json").json::<Vec<String>>().unwrap_err();
        match err {
            Error::Deserialization {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, "not json");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected Deserialization, got {:?}", other),
        }
    }

    #[test]
    fn test_json_opt_empty_body() {
        assert_eq!(response("").json_opt::<serde_json::Value>().unwrap(), None);
        assert_eq!(
            response("{}").json_opt::<serde_json::Value>().unwrap(),
            Some(serde_json::json!({}))
        );
    }
}
