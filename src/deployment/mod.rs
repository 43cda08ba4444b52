//! # Deployment Identity Resolution
//!
//! Decides which deployments of the same artifact are "the same thing at different
//! versions", which is what latest-wins delivery to start nodes is keyed on.

pub mod identity;
pub mod version;

pub use identity::{
    DeploymentIdentity, DeploymentIdentityResolver, ResolvedDeployment, VersionedDeploymentId,
};
pub use version::ArtifactVersion;
