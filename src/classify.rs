//! Classification of transport attempts into the error taxonomy.
//!
//! A single attempt ends in exactly one [`Outcome`]. [`Outcome::into_result`]
//! turns it into either the raw response or the matching [`Error`] variant.

use crate::{headers, response::RawResponse, ApiError, Error, Result};
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// Message used when the response body carries nothing useful.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// The result of one request attempt.
#[derive(Debug)]
pub enum Outcome {
    /// A 2xx response.
    Success(RawResponse),
    /// The transport failed before a response arrived.
    Connection {
        url: String,
        source: reqwest::Error,
    },
    /// The attempt exceeded the configured timeout.
    Timeout {
        url: String,
        timeout: Option<Duration>,
        source: reqwest::Error,
    },
    /// A non-2xx response.
    Api {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },
}

impl Outcome {
    /// Builds the outcome of a failed `send()` or body read.
    pub fn from_transport_error(
        url: impl Into<String>,
        timeout: Option<Duration>,
        source: reqwest::Error,
    ) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Outcome::Timeout {
                url,
                timeout,
                source,
            }
        } else {
            Outcome::Connection { url, source }
        }
    }

    /// Converts the outcome into the caller-facing result.
    pub fn into_result(self) -> Result<RawResponse> {
        match self {
            Outcome::Success(response) => Ok(response),
            Outcome::Connection { url, source } => Err(Error::Connection {
                message: format!("Failed to connect to {}", url),
                source,
            }),
            Outcome::Timeout {
                url,
                timeout,
                source,
            } => Err(Error::Timeout {
                message: format!("Request to {} timed out", url),
                timeout,
                source,
            }),
            Outcome::Api {
                status,
                headers,
                body,
            } => Err(classify_status(status, &headers, body)),
        }
    }
}

/// Maps a non-2xx response to its error variant.
///
/// # Examples
///
/// ```
/// use mender_sdk::{classify::classify_status, Error};
/// use http::{HeaderMap, StatusCode};
///
/// let err = classify_status(
///     StatusCode::BAD_REQUEST,
///     &HeaderMap::new(),
///     r#"{"error": "bad input"}"#.to_string(),
/// );
/// assert!(matches!(err, Error::Validation(ref e) if e.message == "bad input"));
/// ```
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: String) -> Error {
    let error = ApiError {
        status,
        message: extract_message(&body),
        body,
        request_id: headers::request_id(headers),
    };

    match status.as_u16() {
        400 => Error::Validation(error),
        401 => Error::Authentication(error),
        403 => Error::Authorization(error),
        404 => Error::NotFound(error),
        409 => Error::Conflict(error),
        429 => Error::RateLimited {
            error,
            retry_after: headers::retry_after(headers),
        },
        500..=599 => Error::Server(error),
        _ => Error::Api(error),
    }
}

/// Extracts the human readable message from an error body.
///
/// Preference order for JSON objects is `error`, `message`, then `Error`.
/// Without any of them the body itself is the message, and an empty body
/// yields [`UNKNOWN_ERROR`].
pub fn extract_message(body: &str) -> String {
    let value = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value,
        Err(_) if body.trim().is_empty() => return UNKNOWN_ERROR.to_string(),
        Err(_) => return body.to_string(),
    };

    if let Some(object) = value.as_object() {
        let preferred = ["error", "message", "Error"]
            .iter()
            .filter_map(|key| object.get(*key))
            .find_map(non_empty);
        return preferred.unwrap_or_else(|| value.to_string());
    }

    non_empty(&value).unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

fn non_empty(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::Array(a) if a.is_empty() => None,
        serde_json::Value::Object(o) if o.is_empty() => None,
        serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
