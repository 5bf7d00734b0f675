//! Deployments API payloads: deployments, artifacts and releases.

use super::common::lenient_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Scheduled,
    Pending,
    #[serde(rename = "inprogress")]
    InProgress,
    Finished,
    /// A state this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Scheduled => "scheduled",
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::InProgress => "inprogress",
            DeploymentStatus::Finished => "finished",
            DeploymentStatus::Unknown => "unknown",
        }
    }
}

/// State of one device within a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceDeploymentStatus {
    Pending,
    Downloading,
    Installing,
    Rebooting,
    Success,
    Failure,
    #[serde(rename = "noartifact")]
    NoArtifact,
    #[serde(rename = "already-installed")]
    AlreadyInstalled,
    Aborted,
    Decommissioned,
    #[serde(rename = "pause_before_installing")]
    PauseBeforeInstalling,
    #[serde(rename = "pause_before_committing")]
    PauseBeforeCommitting,
    #[serde(rename = "pause_before_rebooting")]
    PauseBeforeRebooting,
    #[serde(other)]
    Unknown,
}

impl DeviceDeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceDeploymentStatus::Pending => "pending",
            DeviceDeploymentStatus::Downloading => "downloading",
            DeviceDeploymentStatus::Installing => "installing",
            DeviceDeploymentStatus::Rebooting => "rebooting",
            DeviceDeploymentStatus::Success => "success",
            DeviceDeploymentStatus::Failure => "failure",
            DeviceDeploymentStatus::NoArtifact => "noartifact",
            DeviceDeploymentStatus::AlreadyInstalled => "already-installed",
            DeviceDeploymentStatus::Aborted => "aborted",
            DeviceDeploymentStatus::Decommissioned => "decommissioned",
            DeviceDeploymentStatus::PauseBeforeInstalling => "pause_before_installing",
            DeviceDeploymentStatus::PauseBeforeCommitting => "pause_before_committing",
            DeviceDeploymentStatus::PauseBeforeRebooting => "pause_before_rebooting",
            DeviceDeploymentStatus::Unknown => "unknown",
        }
    }

    /// Returns `true` once the device will not progress any further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeviceDeploymentStatus::Success
                | DeviceDeploymentStatus::Failure
                | DeviceDeploymentStatus::NoArtifact
                | DeviceDeploymentStatus::AlreadyInstalled
                | DeviceDeploymentStatus::Aborted
                | DeviceDeploymentStatus::Decommissioned
        )
    }
}

/// One update carried by an artifact.
///
/// The module type is reported either as `type` or nested in `type_info`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateModule {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_info: Option<Value>,
    #[serde(default)]
    pub files: Vec<Value>,
    #[serde(default)]
    pub meta_data: Value,
}

impl UpdateModule {
    /// The update module type, e.g. `rootfs-image`.
    pub fn kind(&self) -> Option<&str> {
        self.module_type.as_deref().filter(|t| !t.is_empty()).or_else(|| {
            self.type_info
                .as_ref()?
                .get("type")
                .and_then(Value::as_str)
        })
    }
}

/// Editable artifact metadata, body of `PUT artifacts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ArtifactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArtifactUpdate {
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }
}

/// An uploaded Mender artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device_types_compatible: Vec<String>,
    #[serde(default)]
    pub info: Value,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub updates: Vec<UpdateModule>,
    #[serde(default)]
    pub artifact_provides: serde_json::Map<String, Value>,
    #[serde(default)]
    pub artifact_depends: serde_json::Map<String, Value>,
    #[serde(default)]
    pub clears_artifact_provides: Vec<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub modified: Option<DateTime<Utc>>,
}

impl Artifact {
    /// Update module types of all updates in this artifact.
    pub fn update_types(&self) -> Vec<&str> {
        self.updates
            .iter()
            .filter_map(UpdateModule::kind)
            .collect()
    }
}

/// One phase of a phased rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPhase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Percentage of devices in this phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_count: Option<u64>,
}

/// Per-state device counts of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentStatistics {
    pub success: u64,
    pub pending: u64,
    pub downloading: u64,
    pub rebooting: u64,
    pub installing: u64,
    pub failure: u64,
    pub noartifact: u64,
    #[serde(rename = "already-installed")]
    pub already_installed: u64,
    pub aborted: u64,
    pub pause_before_installing: u64,
    pub pause_before_rebooting: u64,
    pub pause_before_committing: u64,
}

impl DeploymentStatistics {
    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.success
            + self.pending
            + self.downloading
            + self.rebooting
            + self.installing
            + self.failure
            + self.noartifact
            + self.already_installed
            + self.aborted
            + self.pause_before_installing
            + self.pause_before_rebooting
            + self.pause_before_committing
    }

    /// Devices still working through the update.
    pub fn in_progress(&self) -> u64 {
        self.pending
            + self.downloading
            + self.installing
            + self.rebooting
            + self.pause_before_installing
            + self.pause_before_rebooting
            + self.pause_before_committing
    }
}

/// A device's entry in a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDevice {
    pub id: String,
    pub status: DeviceDeploymentStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub substate: Option<String>,
}

/// A deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub artifact_name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub finished: Option<DateTime<Utc>>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub device_count: u64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub max_devices: Option<u64>,
    #[serde(default)]
    pub phases: Vec<DeploymentPhase>,
    #[serde(default)]
    pub statistics: Option<DeploymentStatistics>,
    #[serde(default, rename = "type")]
    pub deployment_type: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub device_list: Vec<String>,
}

impl Deployment {
    pub fn is_finished(&self) -> bool {
        self.status == DeploymentStatus::Finished
    }
}

/// Body of `POST deployments`.
///
/// Unset fields are left out of the request.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NewDeployment {
    pub name: String,
    pub artifact_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub all_devices: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_devices: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<DeploymentPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_installation: bool,
}

impl NewDeployment {
    pub fn new(name: impl Into<String>, artifact_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact_name: artifact_name.into(),
            ..Default::default()
        }
    }

    pub fn devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = devices.into_iter().map(Into::into).collect();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn all_devices(mut self) -> Self {
        self.all_devices = true;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn max_devices(mut self, max_devices: u64) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    pub fn phase(mut self, phase: DeploymentPhase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn filter_id(mut self, filter_id: impl Into<String>) -> Self {
        self.filter_id = Some(filter_id.into());
        self
    }

    /// Installs even on devices already running the artifact.
    pub fn force_installation(mut self) -> Self {
        self.force_installation = true;
        self
    }
}

/// A release groups the artifacts sharing one artifact name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub update_types: Vec<String>,
    #[serde(default)]
    pub device_types: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub modified: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_deserialize() {
        let deployment: Deployment = serde_json::from_value(json!({
            "id": "dep-1",
            "name": "nightly",
            "artifact_name": "release-2.1",
            "created": "2024-03-01T08:00:00.000Z",
            "status": "inprogress",
            "device_count": 3,
            "statistics": {"success": 1, "already-installed": 1, "downloading": 1},
            "type": "software"
        }))
        .unwrap();

        assert_eq!(deployment.status, DeploymentStatus::InProgress);
        assert!(!deployment.is_finished());
        assert_eq!(deployment.deployment_type.as_deref(), Some("software"));
        let stats = deployment.statistics.unwrap();
        assert_eq!(stats.already_installed, 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.in_progress(), 1);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: DeploymentStatus = serde_json::from_value(json!("paused")).unwrap();
        assert_eq!(status, DeploymentStatus::Unknown);

        let status: DeviceDeploymentStatus =
            serde_json::from_value(json!("already-installed")).unwrap();
        assert_eq!(status, DeviceDeploymentStatus::AlreadyInstalled);
        assert!(status.is_terminal());
        assert_eq!(status.as_str(), "already-installed");
    }

    #[test]
    fn test_new_deployment_omits_unset_fields() {
        let body = NewDeployment::new("rollout", "release-3")
            .devices(["a", "b"])
            .retries(2);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "name": "rollout",
                "artifact_name": "release-3",
                "devices": ["a", "b"],
                "retries": 2
            })
        );

        let body = NewDeployment::new("everyone", "release-3").all_devices();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "everyone", "artifact_name": "release-3", "all_devices": true})
        );
    }

    #[test]
    fn test_artifact_update_body() {
        assert_eq!(
            serde_json::to_value(ArtifactUpdate::description("signed build")).unwrap(),
            json!({"description": "signed build"})
        );
        assert_eq!(
            serde_json::to_value(ArtifactUpdate::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_artifact_update_types() {
        let artifact: Artifact = serde_json::from_value(json!({
            "id": "art-1",
            "name": "release-1",
            "device_types_compatible": ["rpi4"],
            "updates": [
                {"type_info": {"type": "rootfs-image"}, "files": []},
                {"type": "single-file"}
            ],
            "size": 1024,
            "modified": "2024-02-02T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(artifact.update_types(), vec!["rootfs-image", "single-file"]);
        assert_eq!(artifact.size, Some(1024));
        assert!(!artifact.signed);
    }
}
