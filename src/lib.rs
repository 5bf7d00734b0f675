//! # mender-sdk - An async client for the Mender management API
//!
//! `mender-sdk` is a typed, retry-aware client for the
//! [Mender](https://mender.io) device-management HTTP API, built on top of
//! `reqwest`. Every call goes through one request executor that applies the
//! retry policy and maps failures onto a small error taxonomy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures_util::TryStreamExt;
//! use mender_sdk::{api::ListDevicesQuery, models::SortOrder, Client, RetryPolicy};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mender_sdk::Error> {
//!     let client = Client::builder()
//!         .base_url("https://hosted.mender.io")?
//!         .token(std::env::var("MENDER_TOKEN").unwrap_or_default())
//!         .timeout(Duration::from_secs(30))
//!         .retry_policy(RetryPolicy::default().max_retries(5))
//!         .build()?;
//!
//!     // One page
//!     let query = ListDevicesQuery::new().sort("hostname", SortOrder::Asc);
//!     let page = client.inventory().list_devices(&query).await?;
//!     println!("{} devices in total", page.total_count.unwrap_or_default());
//!
//!     // Every page, fetched lazily
//!     let all: Vec<_> = client
//!         .inventory()
//!         .devices(ListDevicesQuery::new(), None)
//!         .try_collect()
//!         .await?;
//!     println!("fetched {}", all.len());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed resources** - Inventory (devices, groups, attributes, filters) and
//!   deployments (deployments, artifacts, releases)
//! - **Retry policy** - Exponential backoff with jitter, bounded by a maximum
//!   delay; `Retry-After` is honored on 429 responses
//! - **Error taxonomy** - Every failure is an [`Error`] with an [`ErrorKind`],
//!   the HTTP status, the server message and the `X-Request-Id`
//! - **Lazy pagination** - [`pagination::paginate`] turns page fetches into a
//!   `Stream`
//! - **Structured logging** - Requests, retries and failures are reported with
//!   `tracing`
//!
//! ## Error Handling
//!
//! ```no_run
//! use mender_sdk::{Client, Error, ErrorKind};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().build()?;
//! match client.inventory().get_device("missing").await {
//!     Ok(device) => println!("found {}", device.id),
//!     Err(Error::NotFound(api)) => {
//!         eprintln!("no such device: {} (request {:?})", api.message, api.request_id);
//!     }
//!     Err(e) if e.kind() == ErrorKind::RateLimited => {
//!         eprintln!("slow down, retry after {:?}", e.retry_after());
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry Policy
//!
//! ```no_run
//! use mender_sdk::{Client, ErrorKind, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), mender_sdk::Error> {
//! let client = Client::builder()
//!     .retry_policy(
//!         RetryPolicy::default()
//!             .max_retries(4)
//!             .base_delay(Duration::from_millis(250))
//!             .max_delay(Duration::from_secs(10))
//!             .retry_on([ErrorKind::Server, ErrorKind::RateLimited]),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod classify;
mod client;
mod error;
pub mod headers;
pub mod metadata;
pub mod models;
pub mod pagination;
mod response;
pub mod retry;

pub use api::{Deployments, Inventory};
pub use client::{Client, ClientBuilder, ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ApiError, Error, ErrorKind, Result};
pub use pagination::{paginate, Page};
pub use response::RawResponse;
pub use retry::RetryPolicy;
