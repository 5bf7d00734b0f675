//! Error types for Mender API calls.
//!
//! Every failure the client can observe maps to exactly one [`Error`] variant.
//! The transport and HTTP-status variants form a closed taxonomy that callers
//! match on directly; the remaining variants cover local problems such as bad
//! configuration or an unreadable artifact file.

use http::StatusCode;
use std::time::Duration;

/// Details of a non-2xx response from the Mender API.
///
/// Carried by every HTTP-status variant of [`Error`] so the caller always has
/// the server's message, the raw body and the correlation id at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Message extracted from the response body.
    pub message: String,
    /// The raw response body.
    pub body: String,
    /// Value of the `X-Request-Id` response header, if present.
    pub request_id: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {}", self.message, self.status.as_u16())?;
        if let Some(request_id) = &self.request_id {
            write!(f, ", request id {}", request_id)?;
        }
        f.write_str(")")
    }
}

/// The main error type for Mender API calls.
///
/// # Examples
///
/// ```no_run
/// use mender_sdk::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://hosted.mender.io")?
///     .token("jwt")
///     .build()?;
///
/// match client.inventory().get_device("device-001").await {
///     Ok(device) => println!("found {}", device.id),
///     Err(Error::NotFound(err)) => eprintln!("no such device: {}", err.message),
///     Err(Error::Authentication(err)) => eprintln!("token rejected: {}", err),
///     Err(e) if e.is_retryable() => eprintln!("transient failure, try later: {}", e),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The connection to the server could not be established, or the
    /// transport failed before a response arrived.
    #[error("Connection error: {message}")]
    Connection {
        /// Human readable description including the target URL.
        message: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded the configured timeout.
    #[error("Request timed out: {message}")]
    Timeout {
        /// Human readable description including the target URL.
        message: String,
        /// The configured timeout, if any.
        timeout: Option<Duration>,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// 400 Bad Request.
    #[error("Validation error: {0}")]
    Validation(ApiError),

    /// 401 Unauthorized.
    #[error("Authentication error: {0}")]
    Authentication(ApiError),

    /// 403 Forbidden.
    #[error("Authorization error: {0}")]
    Authorization(ApiError),

    /// 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(ApiError),

    /// 409 Conflict.
    #[error("Conflict: {0}")]
    Conflict(ApiError),

    /// 429 Too Many Requests.
    ///
    /// `retry_after` holds the `Retry-After` header parsed as whole seconds.
    #[error("Rate limited: {error}")]
    RateLimited {
        /// Response details.
        error: ApiError,
        /// Server-suggested delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// Any 5xx response.
    #[error("Server error: {0}")]
    Server(ApiError),

    /// Any other non-2xx response.
    #[error("API error: {0}")]
    Api(ApiError),

    /// A successful response body did not match the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    Deserialization {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(String),

    /// Invalid client or request configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of an [`Error`], used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimited,
    Server,
    Api,
    /// Local failures: configuration, (de)serialization, I/O.
    Local,
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::Authorization(_) => ErrorKind::Authorization,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::Server(_) => ErrorKind::Server,
            Error::Api(_) => ErrorKind::Api,
            Error::Deserialization { .. }
            | Error::Serialization(_)
            | Error::Configuration(_)
            | Error::InvalidUrl(_)
            | Error::Io(_) => ErrorKind::Local,
        }
    }

    /// Returns `true` if retrying the same request later may succeed.
    ///
    /// Connection failures, timeouts, 5xx and 429 responses are transient.
    /// Other 4xx responses mean the request itself must change.
    ///
    /// # Examples
    ///
    /// ```
    /// use mender_sdk::{ApiError, Error};
    /// use http::StatusCode;
    ///
    /// let err = Error::Server(ApiError {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     message: "try again".to_string(),
    ///     body: String::new(),
    ///     request_id: None,
    /// });
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Validation(ApiError {
    ///     status: StatusCode::BAD_REQUEST,
    ///     message: "bad input".to_string(),
    ///     body: String::new(),
    ///     request_id: None,
    /// });
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Server | ErrorKind::RateLimited
        )
    }

    /// Returns the API error details for HTTP-status variants.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Validation(e)
            | Error::Authentication(e)
            | Error::Authorization(e)
            | Error::NotFound(e)
            | Error::Conflict(e)
            | Error::Server(e)
            | Error::Api(e) => Some(e),
            Error::RateLimited { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Deserialization { status, .. } => Some(*status),
            _ => self.api_error().map(|e| e.status),
        }
    }

    /// Returns the server's error message for HTTP-status variants.
    pub fn message(&self) -> Option<&str> {
        self.api_error().map(|e| e.message.as_str())
    }

    /// Returns the raw response body if this error has one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Deserialization { raw_response, .. } => Some(raw_response),
            _ => self.api_error().map(|e| e.body.as_str()),
        }
    }

    /// Returns the correlation id echoed by the server.
    pub fn request_id(&self) -> Option<&str> {
        self.api_error()?.request_id.as_deref()
    }

    /// Returns the server-suggested delay of a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A specialized `Result` type for Mender API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> ApiError {
        ApiError {
            status: StatusCode::from_u16(status).unwrap(),
            message: "boom".to_string(),
            body: r#"{"error":"boom"}"#.to_string(),
            request_id: Some("req-1".to_string()),
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for err in [
            Error::Validation(api_error(400)),
            Error::Authentication(api_error(401)),
            Error::Authorization(api_error(403)),
            Error::NotFound(api_error(404)),
            Error::Conflict(api_error(409)),
            Error::Api(api_error(418)),
            Error::Configuration("bad".to_string()),
        ] {
            assert!(!err.is_retryable(), "{:?} should not be retryable", err);
        }
    }

    #[test]
    fn test_rate_limit_accessors() {
        let err = Error::RateLimited {
            error: api_error(429),
            retry_after: Some(Duration::from_secs(7)),
        };

        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.request_id(), Some("req-1"));
        assert_eq!(err.message(), Some("boom"));
    }

    #[test]
    fn test_display_includes_status_and_request_id() {
        let err = Error::NotFound(api_error(404));
        assert_eq!(
            err.to_string(),
            "Not found: boom (status 404, request id req-1)"
        );
    }
}
