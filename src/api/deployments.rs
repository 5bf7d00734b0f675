//! Deployments API (`/api/management/v1/deployments`).

use super::{join_path, page_params};
use crate::{
    metadata::{FilePart, Multipart, RequestMetadata},
    models::{
        sort_param, Artifact, ArtifactUpdate, Deployment, DeploymentDevice, DeploymentStatistics,
        DeploymentStatus, DeviceDeploymentStatus, NewDeployment, Release, SortOrder,
    },
    pagination::{paginate, Page, DEFAULT_PER_PAGE, DEFAULT_STREAM_PER_PAGE},
    Client, Error, Result,
};
use futures_util::Stream;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::Path;

const BASE_PATH: &str = "/api/management/v1/deployments";

/// Query of [`Deployments::list_deployments`].
///
/// Sorted by creation time, newest first, unless told otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDeploymentsQuery {
    /// 1-based page number.
    pub page: u32,
    /// Deployments per page.
    pub per_page: u32,
    /// Only deployments in this state.
    pub status: Option<DeploymentStatus>,
    /// Matches deployment names.
    pub search: Option<String>,
    /// Field to sort by, `created` by default.
    pub sort_by: String,
    pub sort_order: SortOrder,
    /// RFC 3339 upper bound on the creation time.
    pub created_before: Option<String>,
    /// RFC 3339 lower bound on the creation time.
    pub created_after: Option<String>,
}

impl Default for ListDeploymentsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            status: None,
            search: None,
            sort_by: "created".to_string(),
            sort_order: SortOrder::Desc,
            created_before: None,
            created_after: None,
        }
    }
}

impl ListDeploymentsQuery {
    /// Page 1, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page number and page size.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Filters by deployment state.
    pub fn status(mut self, status: DeploymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by a name fragment.
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Sorts by `sort_by` in `order`.
    pub fn sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = sort_by.into();
        self.sort_order = order;
        self
    }

    /// Only deployments created before `timestamp`.
    pub fn created_before(mut self, timestamp: impl Into<String>) -> Self {
        self.created_before = Some(timestamp.into());
        self
    }

    /// Only deployments created after `timestamp`.
    pub fn created_after(mut self, timestamp: impl Into<String>) -> Self {
        self.created_after = Some(timestamp.into());
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = page_params(self.page, self.per_page);
        params.push(("sort".to_string(), sort_param(&self.sort_by, self.sort_order)));
        if let Some(status) = self.status {
            params.push(("status".to_string(), status.as_str().to_string()));
        }
        let optional = [
            ("search", &self.search),
            ("created_before", &self.created_before),
            ("created_after", &self.created_after),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push((key.to_string(), value.to_string()));
            }
        }
        params
    }
}

/// Query of [`Deployments::list_releases`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListReleasesQuery {
    /// 1-based page number.
    pub page: u32,
    /// Releases per page.
    pub per_page: u32,
    /// Release name filter.
    pub name: Option<String>,
    /// Only releases compatible with this device type.
    pub device_type: Option<String>,
    /// Only releases containing this update module type.
    pub update_type: Option<String>,
}

impl Default for ListReleasesQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            name: None,
            device_type: None,
            update_type: None,
        }
    }
}

impl ListReleasesQuery {
    /// Page 1 with the default page size, no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page number and page size.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Filters by release name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Filters by compatible device type.
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    /// Filters by update module type.
    pub fn update_type(mut self, update_type: impl Into<String>) -> Self {
        self.update_type = Some(update_type.into());
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = page_params(self.page, self.per_page);
        let optional = [
            ("name", &self.name),
            ("device_type", &self.device_type),
            ("update_type", &self.update_type),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.push((key.to_string(), value.to_string()));
            }
        }
        params
    }
}

/// Deployments, artifacts and releases.
///
/// Obtained with [`Client::deployments`].
#[derive(Debug, Clone, Copy)]
pub struct Deployments<'a> {
    client: &'a Client,
}

impl<'a> Deployments<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(parts: &[&str]) -> String {
        join_path(BASE_PATH, parts)
    }

    async fn list_page<T>(
        &self,
        path: String,
        params: Vec<(String, String)>,
        page: u32,
        per_page: u32,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::GET, path).with_query_params(params);
        let response = self.client.execute(metadata).await?;
        let items: Vec<T> = response.json()?;
        Ok(Page::from_response(items, &response.headers, page, per_page))
    }

    // Deployments

    /// Lists one page of deployments.
    pub async fn list_deployments(&self, query: &ListDeploymentsQuery) -> Result<Page<Deployment>> {
        self.list_page(
            Self::path(&["deployments"]),
            query.params(),
            query.page,
            query.per_page,
        )
        .await
    }

    /// Streams every deployment matching `query`, starting from page 1.
    ///
    /// Pass `None` as `per_page` to use pages of 100.
    pub fn deployments(
        &self,
        query: ListDeploymentsQuery,
        per_page: Option<u32>,
    ) -> impl Stream<Item = Result<Deployment>> + 'a {
        let deployments = *self;
        paginate(
            per_page.unwrap_or(DEFAULT_STREAM_PER_PAGE),
            move |page, per_page| {
                let query = query.clone().page(page, per_page);
                async move { deployments.list_deployments(&query).await }
            },
        )
    }

    /// Fetches one deployment.
    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.client
            .get(Self::path(&["deployments", deployment_id]), &[])
            .await?
            .json()
    }

    /// Creates a deployment and returns its ID, taken from the `Location` header.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mender_sdk::{models::NewDeployment, Client};
    ///
    /// # async fn example() -> Result<(), mender_sdk::Error> {
    /// let client = Client::builder().token("jwt").build()?;
    ///
    /// let deployment = NewDeployment::new("rollout-1.2", "release-1.2")
    ///     .group("canary")
    ///     .retries(2);
    /// let id = client.deployments().create_deployment(&deployment).await?;
    /// println!("created {}", id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_deployment(&self, deployment: &NewDeployment) -> Result<String> {
        let response = self
            .client
            .post(Self::path(&["deployments"]), deployment)
            .await?;
        let id = response.location_id();
        tracing::info!(
            deployment_id = %id,
            artifact_name = %deployment.artifact_name,
            "Created deployment"
        );
        Ok(id)
    }

    /// Deploys to an explicit list of devices.
    ///
    /// `retries` of 0 leaves the per-device retry count unset.
    pub async fn create_deployment_for_devices<I, S>(
        &self,
        name: &str,
        artifact_name: &str,
        devices: I,
        retries: u32,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let deployment = with_retries(NewDeployment::new(name, artifact_name).devices(devices), retries);
        self.create_deployment(&deployment).await
    }

    /// Deploys to every device in `group`.
    pub async fn create_deployment_for_group(
        &self,
        name: &str,
        artifact_name: &str,
        group: &str,
        retries: u32,
    ) -> Result<String> {
        let deployment = with_retries(NewDeployment::new(name, artifact_name).group(group), retries);
        self.create_deployment(&deployment).await
    }

    /// Deploys to every accepted device.
    pub async fn create_deployment_for_all_devices(
        &self,
        name: &str,
        artifact_name: &str,
        retries: u32,
    ) -> Result<String> {
        let deployment = with_retries(NewDeployment::new(name, artifact_name).all_devices(), retries);
        self.create_deployment(&deployment).await
    }

    /// Aborts a deployment that has not finished.
    pub async fn abort_deployment(&self, deployment_id: &str) -> Result<()> {
        self.client
            .put(
                Self::path(&["deployments", deployment_id, "status"]),
                &json!({ "status": "aborted" }),
            )
            .await?;
        Ok(())
    }

    /// Per-state device counts of a deployment.
    pub async fn deployment_statistics(&self, deployment_id: &str) -> Result<DeploymentStatistics> {
        self.client
            .get(Self::path(&["deployments", deployment_id, "statistics"]), &[])
            .await?
            .json()
    }

    /// Lists one page of the devices in a deployment.
    pub async fn list_deployment_devices(
        &self,
        deployment_id: &str,
        page: u32,
        per_page: u32,
        status: Option<DeviceDeploymentStatus>,
    ) -> Result<Page<DeploymentDevice>> {
        let mut params = page_params(page, per_page);
        if let Some(status) = status {
            params.push(("status".to_string(), status.as_str().to_string()));
        }
        self.list_page(
            Self::path(&["deployments", deployment_id, "devices"]),
            params,
            page,
            per_page,
        )
        .await
    }

    /// Returns the update log a device reported for a deployment.
    pub async fn deployment_device_log(&self, deployment_id: &str, device_id: &str) -> Result<String> {
        let response = self
            .client
            .get(
                Self::path(&["deployments", deployment_id, "devices", device_id, "log"]),
                &[],
            )
            .await?;
        Ok(response.text())
    }

    /// Lists one page of the deployments that targeted a device.
    pub async fn device_deployment_history(
        &self,
        device_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Deployment>> {
        let mut params = page_params(page, per_page);
        params.push(("device_id".to_string(), device_id.to_string()));
        self.list_page(Self::path(&["deployments"]), params, page, per_page)
            .await
    }

    // Artifacts

    /// Lists one page of artifacts.
    pub async fn list_artifacts(&self, page: u32, per_page: u32) -> Result<Page<Artifact>> {
        self.list_page(
            Self::path(&["artifacts"]),
            page_params(page, per_page),
            page,
            per_page,
        )
        .await
    }

    /// Streams every artifact. Pass `None` to use pages of 100.
    pub fn artifacts(&self, per_page: Option<u32>) -> impl Stream<Item = Result<Artifact>> + 'a {
        let deployments = *self;
        paginate(
            per_page.unwrap_or(DEFAULT_STREAM_PER_PAGE),
            move |page, per_page| async move { deployments.list_artifacts(page, per_page).await },
        )
    }

    /// Fetches one artifact.
    pub async fn get_artifact(&self, artifact_id: &str) -> Result<Artifact> {
        self.client
            .get(Self::path(&["artifacts", artifact_id]), &[])
            .await?
            .json()
    }

    /// Uploads an artifact and returns its ID.
    ///
    /// The content is sent as the `artifact` field of a multipart form, with
    /// `description` as an extra text field when given. The form is rebuilt
    /// from memory on every retry attempt.
    pub async fn upload_artifact(
        &self,
        file_name: &str,
        content: Vec<u8>,
        description: Option<&str>,
    ) -> Result<String> {
        let size = content.len();
        let mut form = Multipart::new();
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            form = form.text("description", description);
        }
        form = form.file(FilePart::new("artifact", file_name, content));

        let metadata =
            RequestMetadata::new(Method::POST, Self::path(&["artifacts"])).with_multipart(form);
        let response = self.client.execute(metadata).await?;
        let id = response.location_id();

        tracing::info!(artifact_id = %id, file_name, bytes = size, "Uploaded artifact");
        Ok(id)
    }

    /// Reads an artifact file from disk and uploads it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub async fn upload_artifact_file(
        &self,
        path: impl AsRef<Path>,
        description: Option<&str>,
    ) -> Result<String> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::Configuration(format!("Not a file path: {}", path.display()))
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;
        self.upload_artifact(&file_name, content, description).await
    }

    /// Edits artifact metadata.
    pub async fn update_artifact(&self, artifact_id: &str, update: &ArtifactUpdate) -> Result<()> {
        self.client
            .put(Self::path(&["artifacts", artifact_id]), update)
            .await?;
        Ok(())
    }

    /// Deletes an artifact.
    pub async fn delete_artifact(&self, artifact_id: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["artifacts", artifact_id]))
            .await?;
        Ok(())
    }

    /// Downloads the artifact content.
    pub async fn download_artifact(&self, artifact_id: &str) -> Result<Vec<u8>> {
        self.client
            .download(Self::path(&["artifacts", artifact_id, "download"]), &[])
            .await
    }

    /// Returns a pre-signed download link, or an empty string when the
    /// server sends none.
    pub async fn artifact_download_url(&self, artifact_id: &str) -> Result<String> {
        let body: Value = self
            .client
            .get(Self::path(&["artifacts", artifact_id, "download"]), &[])
            .await?
            .json()?;
        Ok(body
            .get("uri")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    // Releases

    /// Lists one page of releases.
    pub async fn list_releases(&self, query: &ListReleasesQuery) -> Result<Page<Release>> {
        self.list_page(
            Self::path(&["deployments", "releases"]),
            query.params(),
            query.page,
            query.per_page,
        )
        .await
    }

    /// Fetches a release by name.
    pub async fn get_release(&self, name: &str) -> Result<Release> {
        self.client
            .get(Self::path(&["deployments", "releases", name]), &[])
            .await?
            .json()
    }

    /// Deletes a release together with its artifacts.
    pub async fn delete_release(&self, name: &str) -> Result<()> {
        self.client
            .delete(Self::path(&["deployments", "releases", name]))
            .await?;
        Ok(())
    }

    /// Storage usage and limit of the tenant.
    pub async fn storage_limits(&self) -> Result<Value> {
        self.client
            .get(Self::path(&["limits", "storage"]), &[])
            .await?
            .json()
    }
}

fn with_retries(deployment: NewDeployment, retries: u32) -> NewDeployment {
    if retries > 0 {
        deployment.retries(retries)
    } else {
        deployment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_list_deployments_params() {
        let query = ListDeploymentsQuery::default();
        assert_eq!(
            pairs(&query.params()),
            vec![("page", "1"), ("per_page", "20"), ("sort", "created:desc")]
        );

        let query = ListDeploymentsQuery::new()
            .page(2, 10)
            .status(DeploymentStatus::InProgress)
            .search("nightly")
            .sort("name", SortOrder::Asc)
            .created_after("2024-01-01T00:00:00Z");
        assert_eq!(
            pairs(&query.params()),
            vec![
                ("page", "2"),
                ("per_page", "10"),
                ("sort", "name:asc"),
                ("status", "inprogress"),
                ("search", "nightly"),
                ("created_after", "2024-01-01T00:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_list_releases_params() {
        let query = ListReleasesQuery::new()
            .device_type("rpi4")
            .update_type("rootfs-image");
        assert_eq!(
            pairs(&query.params()),
            vec![
                ("page", "1"),
                ("per_page", "20"),
                ("device_type", "rpi4"),
                ("update_type", "rootfs-image"),
            ]
        );
    }

    #[test]
    fn test_with_retries() {
        let base = NewDeployment::new("n", "a");
        assert_eq!(with_retries(base.clone(), 0).retries, None);
        assert_eq!(with_retries(base, 3).retries, Some(3));
    }
}
