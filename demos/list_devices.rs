//! Example listing inventory devices and groups.
//!
//! This example shows how to:
//! - Configure a client from environment variables
//! - Fetch a single page and read the total count
//! - Stream every device lazily across pages
//!
//! Run with:
//! `MENDER_URL=https://hosted.mender.io MENDER_TOKEN=... cargo run --example list_devices`

use futures_util::TryStreamExt;
use mender_sdk::api::ListDevicesQuery;
use mender_sdk::models::{AttributeScope, SortOrder};
use mender_sdk::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mender_sdk=info".into()),
        )
        .init();

    let base_url = std::env::var("MENDER_URL").unwrap_or_else(|_| mender_sdk::DEFAULT_BASE_URL.into());
    let token = std::env::var("MENDER_TOKEN")?;

    let client = Client::builder().base_url(&base_url)?.token(token).build()?;
    let inventory = client.inventory();

    println!("=== First page ===");
    let query = ListDevicesQuery::new()
        .page(1, 10)
        .sort("updated_ts", SortOrder::Desc);
    let page = inventory.list_devices(&query).await?;
    println!(
        "{} devices shown, {} in total",
        page.items.len(),
        page.total_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    for device in &page.items {
        let device_type = device
            .attribute_value("device_type", Some(AttributeScope::Identity))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!("  {}  {}", device.id, device_type);
    }
    println!();

    println!("=== Groups ===");
    for group in inventory.list_groups(None).await? {
        println!("  {}", group.name);
    }
    println!();

    println!("=== All devices ===");
    let mut devices = Box::pin(inventory.devices(ListDevicesQuery::new(), None));
    let mut count = 0;
    while let Some(device) = devices.try_next().await? {
        count += 1;
        if count <= 5 {
            println!("  {}", device.id);
        }
    }
    println!("  ... {} devices", count);

    client.close().await;
    Ok(())
}
