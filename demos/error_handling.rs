//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Match on the error variants of failed calls
//! - Read the status, server message and request id
//! - Check if errors are retryable
//! - Tune which failures the client retries
//!
//! Run with: `MENDER_TOKEN=... cargo run --example error_handling`

use mender_sdk::{Client, Error, ErrorKind, RetryPolicy};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("mender_sdk=info")
        .init();

    let client = Client::builder()
        .token(std::env::var("MENDER_TOKEN").unwrap_or_default())
        .retry_policy(
            RetryPolicy::default()
                .max_retries(2)
                .base_delay(Duration::from_millis(500)),
        )
        .build()?;

    println!("=== Example 1: Matching on error variants ===");
    match client.inventory().get_device("does-not-exist").await {
        Ok(device) => println!("Unexpected success: {}", device.id),
        Err(Error::NotFound(err)) => {
            println!("Not found!");
            println!("  Status: {}", err.status);
            println!("  Message: {}", err.message);
            println!("  Request id: {:?}", err.request_id);
        }
        Err(Error::Authentication(err)) => {
            println!("Token rejected: {}", err.message);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Generic accessors ===");
    if let Err(e) = client.deployments().get_deployment("bogus").await {
        println!("  Kind: {:?}", e.kind());
        println!("  Status: {:?}", e.status());
        println!("  Message: {:?}", e.message());
        println!("  Retryable: {}", e.is_retryable());
        if let Some(body) = e.body() {
            println!("  Raw body: {}", body);
        }
    }
    println!();

    println!("=== Example 3: Connection failures ===");
    let unreachable = Client::builder()
        .base_url("http://127.0.0.1:1")?
        .timeout(Duration::from_secs(2))
        .retry_policy(RetryPolicy::none())
        .build()?;
    match unreachable.inventory().list_groups(None).await {
        Err(e) if e.kind() == ErrorKind::Connection => {
            println!("Connection failed as expected: {}", e);
            println!("  Retryable: {}", e.is_retryable());
        }
        other => println!("Unexpected: {:?}", other),
    }
    println!();

    println!("=== Example 4: Retrying only rate limits ===");
    let patient = Client::builder()
        .token(std::env::var("MENDER_TOKEN").unwrap_or_default())
        .retry_policy(RetryPolicy::default().retry_on([ErrorKind::RateLimited]))
        .build()?;
    match patient.deployments().storage_limits().await {
        Ok(limits) => println!("Storage limits: {}", limits),
        Err(e) => println!("Failed without retrying server errors: {}", e),
    }

    Ok(())
}
