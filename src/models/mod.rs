//! Typed payloads of the Mender management API.

mod common;
mod deployments;
mod inventory;

pub use common::SortOrder;
pub(crate) use common::sort_param;
pub use deployments::{
    Artifact, ArtifactUpdate, Deployment, DeploymentDevice, DeploymentPhase, DeploymentStatistics,
    DeploymentStatus, DeviceDeploymentStatus, NewDeployment, Release, UpdateModule,
};
pub use inventory::{
    AttributeScope, Device, DeviceAttribute, DeviceSearchFilter, FilterDefinition, FilterOperator,
    FilterPredicate, Group, InventoryFilter, SearchResult, SearchSort,
};
