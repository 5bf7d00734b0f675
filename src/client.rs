//! HTTP client with retry logic and the Mender error taxonomy.
//!
//! The [`Client`] type is the request executor every resource method goes
//! through. Use [`ClientBuilder`] to configure and create clients.

use crate::{
    api::{Deployments, Inventory},
    classify::Outcome,
    headers,
    metadata::{RequestBody, RequestMetadata},
    retry::RetryPolicy,
    Error, RawResponse, Result,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Base URL of the hosted Mender service.
pub const DEFAULT_BASE_URL: &str = "https://hosted.mender.io";

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const JSON: &str = "application/json";

/// Immutable connection settings shared by every request of a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL; request paths are appended to its path.
    pub base_url: Url,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Whether server certificates are verified.
    pub verify_tls: bool,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Headers added to every request.
    pub default_headers: HeaderMap,
    /// Retry policy applied to every request.
    pub retry_policy: RetryPolicy,
}

/// An HTTP client for the Mender management API.
///
/// The client is cheap to clone and designed to be reused: clones share the
/// connection pool, the configuration and the bearer token. The underlying
/// connection pool is created on first use and dropped by [`Client::close`].
///
/// # Examples
///
/// ```no_run
/// use mender_sdk::{Client, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), mender_sdk::Error> {
/// let client = Client::builder()
///     .base_url("https://hosted.mender.io")?
///     .token("your-jwt")
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::default().max_retries(5))
///     .build()?;
///
/// let page = client
///     .inventory()
///     .list_devices(&Default::default())
///     .await?;
/// for device in &page.items {
///     println!("{}", device.id);
/// }
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    session: RwLock<Option<reqwest::Client>>,
    token: RwLock<Option<String>>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.config.base_url
    }

    /// Inventory API: devices, groups, attributes and filters.
    pub fn inventory(&self) -> Inventory<'_> {
        Inventory::new(self)
    }

    /// Deployments API: deployments, artifacts and releases.
    pub fn deployments(&self) -> Deployments<'_> {
        Deployments::new(self)
    }

    /// Sets or replaces the bearer token used for subsequent requests.
    ///
    /// Requests already in flight keep the token they were sent with.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.inner.token.write().await = Some(token.into());
        tracing::debug!("Bearer token updated");
    }

    /// Removes the bearer token.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
        tracing::debug!("Bearer token cleared");
    }

    /// Returns `true` if a bearer token is configured.
    pub async fn has_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    /// Drops the pooled connections.
    ///
    /// The next request opens a new session. Must not be called while other
    /// requests on this client are in flight.
    pub async fn close(&self) {
        if self.inner.session.write().await.take().is_some() {
            tracing::debug!(base_url = %self.inner.config.base_url, "Closed HTTP session");
        }
    }

    /// Executes a request under the retry policy.
    ///
    /// This is the single entry point every request goes through. Retryable
    /// failures are retried after the policy delay until the attempt budget is
    /// spent; the last error is then returned unchanged. Other failures are
    /// returned immediately.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mender_sdk::{metadata::RequestMetadata, Client};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), mender_sdk::Error> {
    /// let client = Client::builder().token("jwt").build()?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "/api/management/v2/inventory/devices")
    ///     .with_query_param("page", 1)
    ///     .with_query_param("per_page", 20);
    ///
    /// let response = client.execute(metadata).await?;
    /// println!("status {} after {} attempts", response.status, response.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute(&self, metadata: RequestMetadata) -> Result<RawResponse> {
        let start_time = Instant::now();
        let policy = &self.inner.config.retry_policy;
        let mut attempt: u32 = 0;

        loop {
            let error = match self.attempt(&metadata, attempt, start_time).await?.into_result() {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !policy.should_retry(&error, attempt) {
                if attempt > 0 && policy.is_retryable(error.kind()) {
                    tracing::warn!(
                        error = %error,
                        attempts = attempt + 1,
                        method = %metadata.method,
                        path = %metadata.path,
                        "Retries exhausted"
                    );
                }
                return Err(error);
            }

            let delay = policy.delay_for_attempt(attempt, error.retry_after());

            tracing::warn!(
                error = %error,
                attempt = attempt + 1,
                max_attempts = policy.max_attempts(),
                method = %metadata.method,
                path = %metadata.path,
                status = error.status().map(|s| s.as_u16()),
                request_id = error.request_id(),
                delay_ms = delay.as_millis() as u64,
                "Request failed, retrying after delay"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Executes a single request attempt.
    ///
    /// Transport failures and non-2xx responses are reported through the
    /// returned [`Outcome`]; the `Err` path is reserved for local problems that
    /// no retry can fix.
    async fn attempt(
        &self,
        metadata: &RequestMetadata,
        attempt: u32,
        start_time: Instant,
    ) -> Result<Outcome> {
        let config = &self.inner.config;
        let url = self.url_for(&metadata.path, &metadata.query_params);

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            attempt = attempt + 1,
            "Executing HTTP request"
        );

        let session = self.session().await?;
        let mut request = session
            .request(metadata.method.clone(), url.clone())
            .headers(self.request_headers(metadata).await?);

        if let Some(timeout) = config.timeout {
            request = request.timeout(timeout);
        }

        match &metadata.body {
            RequestBody::Empty => {}
            RequestBody::Json(json) => request = request.json(json),
            RequestBody::Multipart(form) => request = request.multipart(form.to_form()?),
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "Transport failure");
                return Ok(Outcome::from_transport_error(url, config.timeout, e));
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let request_id = headers::request_id(&response_headers);

        tracing::info!(
            method = %metadata.method,
            path = %metadata.path,
            status = status.as_u16(),
            request_id = request_id.as_deref(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            attempt = attempt + 1,
            "Received HTTP response"
        );

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, url = %url, "Failed to read error body");
                    return Ok(Outcome::from_transport_error(url, config.timeout, e));
                }
            };

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    request_id = request_id.as_deref(),
                    response = %body,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    request_id = request_id.as_deref(),
                    response = %body,
                    "Server error (5xx)"
                );
            }

            return Ok(Outcome::Api {
                status,
                headers: response_headers,
                body,
            });
        }

        match response.bytes().await {
            Ok(body) => Ok(Outcome::Success(RawResponse::new(
                status,
                response_headers,
                body.to_vec(),
                start_time.elapsed(),
                attempt as usize + 1,
            ))),
            Err(e) => Ok(Outcome::from_transport_error(url, config.timeout, e)),
        }
    }

    /// Returns the pooled `reqwest::Client`, creating it on first use.
    async fn session(&self) -> Result<reqwest::Client> {
        if let Some(session) = self.inner.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut guard = self.inner.session.write().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let config = &self.inner.config;
        let session = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            base_url = %config.base_url,
            verify_tls = config.verify_tls,
            "Opened HTTP session"
        );

        *guard = Some(session.clone());
        Ok(session)
    }

    /// Appends `path` to the base URL's path and adds the query string.
    fn url_for(&self, path: &str, query: &[(String, String)]) -> Url {
        let base = &self.inner.config.base_url;
        let mut url = base.clone();
        url.set_path(&format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        ));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        url
    }

    /// Builds the header set for one attempt.
    ///
    /// Order of precedence, lowest first: JSON defaults, bearer token, client
    /// default headers, request headers. Multipart requests carry no
    /// `Content-Type` so the transport can add the boundary.
    async fn request_headers(&self, metadata: &RequestMetadata) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(JSON));
        if !metadata.is_multipart() {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
        }

        if let Some(token) = self.inner.token.read().await.as_deref() {
            let mut value = HeaderValue::try_from(format!("Bearer {}", token))
                .map_err(|e| Error::Configuration(format!("Invalid bearer token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        for (name, value) in self.inner.config.default_headers.iter().chain(&metadata.headers) {
            headers.insert(name.clone(), value.clone());
        }

        if metadata.is_multipart() {
            headers.remove(header::CONTENT_TYPE);
        }

        Ok(headers)
    }

    /// Makes a GET request with optional query parameters.
    pub async fn get(&self, path: impl Into<String>, query: &[(&str, &str)]) -> Result<RawResponse> {
        let metadata = RequestMetadata::new(Method::GET, path)
            .with_query_params(query.iter().copied());
        self.execute(metadata).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B>(&self, path: impl Into<String>, body: &B) -> Result<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        let metadata = RequestMetadata::new(Method::POST, path).with_json(body)?;
        self.execute(metadata).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B>(&self, path: impl Into<String>, body: &B) -> Result<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        let metadata = RequestMetadata::new(Method::PUT, path).with_json(body)?;
        self.execute(metadata).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<B>(&self, path: impl Into<String>, body: &B) -> Result<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        let metadata = RequestMetadata::new(Method::PATCH, path).with_json(body)?;
        self.execute(metadata).await
    }

    /// Makes a DELETE request.
    pub async fn delete(&self, path: impl Into<String>) -> Result<RawResponse> {
        self.execute(RequestMetadata::new(Method::DELETE, path)).await
    }

    /// Downloads a binary body with a GET request.
    pub async fn download(
        &self,
        path: impl Into<String>,
        query: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        let response = self.get(path, query).await?;
        tracing::debug!(bytes = response.body.len(), "Downloaded binary content");
        Ok(response.into_bytes())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("timeout", &self.inner.config.timeout)
            .field("verify_tls", &self.inner.config.verify_tls)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use mender_sdk::{ClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), mender_sdk::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://mender.example.com")?
///     .token("jwt")
///     .timeout(Duration::from_secs(10))
///     .verify_tls(false)
///     .retry_policy(RetryPolicy::default().max_retries(2).jitter(false))
///     .default_header("X-Tenant", "acme")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    token: Option<String>,
    timeout: Option<Duration>,
    verify_tls: bool,
    user_agent: String,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: Some(DEFAULT_TIMEOUT),
            verify_tls: true,
            user_agent: concat!("mender-sdk-rust/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Sets the base URL for all requests. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the bearer token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disables the per-attempt timeout.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets whether server certificates are verified. Defaults to `true`.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry policy for failed requests.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path (for example
    /// `mailto:` URLs).
    pub fn build(self) -> Result<Client> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Base URL cannot be used as a base: {}",
                base_url
            )));
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: ClientConfig {
                    base_url,
                    timeout: self.timeout,
                    verify_tls: self.verify_tls,
                    user_agent: self.user_agent,
                    default_headers: self.default_headers,
                    retry_policy: self.retry_policy,
                },
                session: RwLock::new(None),
                token: RwLock::new(self.token),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> Client {
        Client::builder().base_url(base).unwrap().build().unwrap()
    }

    #[test]
    fn test_url_joins_base_path() {
        let client = client("https://mender.example.com/proxy/");
        let url = client.url_for("/api/management/v2/inventory/devices", &[]);
        assert_eq!(
            url.as_str(),
            "https://mender.example.com/proxy/api/management/v2/inventory/devices"
        );
    }

    #[test]
    fn test_url_with_query() {
        let client = client("https://hosted.mender.io");
        let url = client.url_for(
            "devices",
            &[
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "name:asc".to_string()),
            ],
        );
        assert_eq!(
            url.as_str(),
            "https://hosted.mender.io/devices?page=2&sort=name%3Aasc"
        );
    }

    #[test]
    fn test_defaults() {
        let client = Client::builder().build().unwrap();
        assert_eq!(client.base_url().as_str(), "https://hosted.mender.io/");
        assert_eq!(client.config().timeout, Some(DEFAULT_TIMEOUT));
        assert!(client.config().verify_tls);
        assert_eq!(client.config().retry_policy, RetryPolicy::default());
        assert!(format!("{:?}", client).contains("hosted.mender.io"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            Client::builder().base_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            Client::builder().base_url("mailto:ops@example.com").unwrap().build(),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_headers_for_json_and_multipart() {
        let client = Client::builder().token("secret").build().unwrap();

        let json = RequestMetadata::new(Method::GET, "/x");
        let headers = client.request_headers(&json).await.unwrap();
        assert_eq!(headers.get(header::ACCEPT).unwrap(), JSON);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), JSON);
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer secret");

        let multipart = RequestMetadata::new(Method::POST, "/x")
            .with_multipart(crate::metadata::Multipart::new().text("a", "b"));
        let headers = client.request_headers(&multipart).await.unwrap();
        assert!(headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(headers.get(header::ACCEPT).unwrap(), JSON);
    }

    #[tokio::test]
    async fn test_token_swap() {
        let client = Client::builder().build().unwrap();
        assert!(!client.has_token().await);

        client.set_token("first").await;
        let headers = client
            .request_headers(&RequestMetadata::default())
            .await
            .unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer first");

        client.clear_token().await;
        let headers = client
            .request_headers(&RequestMetadata::default())
            .await
            .unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }
}
