//! Example uploading an artifact and deploying it to a group.
//!
//! Run with:
//! `MENDER_TOKEN=... cargo run --example deploy_artifact -- path/to/release.mender prod`

use mender_sdk::models::{DeploymentStatus, NewDeployment};
use mender_sdk::{Client, RetryPolicy};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mender_sdk=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let artifact_path = args.next().ok_or("usage: deploy_artifact <artifact> <group>")?;
    let group = args.next().ok_or("usage: deploy_artifact <artifact> <group>")?;

    let client = Client::builder()
        .token(std::env::var("MENDER_TOKEN")?)
        // Uploads can be large
        .timeout(Duration::from_secs(300))
        .retry_policy(RetryPolicy::default().max_retries(5))
        .build()?;
    let deployments = client.deployments();

    let artifact_id = deployments
        .upload_artifact_file(&artifact_path, Some("uploaded by deploy_artifact"))
        .await?;
    let artifact = deployments.get_artifact(&artifact_id).await?;
    println!(
        "Uploaded {} ({}) for {:?}",
        artifact.name,
        artifact_id,
        artifact.device_types_compatible
    );

    let deployment_id = deployments
        .create_deployment(
            &NewDeployment::new(format!("{} to {}", artifact.name, group), &artifact.name)
                .group(&group)
                .retries(2),
        )
        .await?;
    println!("Created deployment {}", deployment_id);

    loop {
        let deployment = deployments.get_deployment(&deployment_id).await?;
        let stats = deployments.deployment_statistics(&deployment_id).await?;
        println!(
            "  {}: {} succeeded, {} failed, {} in progress",
            deployment.status.as_str(),
            stats.success,
            stats.failure,
            stats.in_progress()
        );
        if deployment.status == DeploymentStatus::Finished {
            break;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    client.close().await;
    Ok(())
}
