//! # Deployment Identities
//!
//! A deployment identifier of the form `group:artifact:version` is split into a
//! version-agnostic [`DeploymentIdentity`] and a [`VersionedDeploymentId`] that orders
//! deployments of the same identity by version.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::version::ArtifactVersion;

/// Version-agnostic key of a deployment (group + artifact)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub group_id: String,
    pub artifact_id: String,
}

impl fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group_id.is_empty() {
            f.write_str(&self.artifact_id)
        } else {
            write!(f, "{}:{}", self.group_id, self.artifact_id)
        }
    }
}

/// A concrete deployment ordered by its version
///
/// Ordered by version first and deployment id second, so two deployments that
/// happen to share a version still coexist in a sorted set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedDeploymentId {
    pub version: ArtifactVersion,
    pub deployment_id: String,
}

impl Ord for VersionedDeploymentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.deployment_id.cmp(&other.deployment_id))
    }
}

impl PartialOrd for VersionedDeploymentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionedDeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.deployment_id, self.version)
    }
}

/// Both identities derived from one deployment identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeployment {
    pub identity: DeploymentIdentity,
    pub versioned: VersionedDeploymentId,
}

/// Derives deployment identities from deployment identifiers
///
/// `group:artifact:version` (extra segments such as a classifier are ignored) yields
/// identity `(group, artifact)`. Any other identifier is its own identity with
/// version `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentIdentityResolver;

impl DeploymentIdentityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, deployment_id: &str) -> ResolvedDeployment {
        let parts: Vec<&str> = deployment_id.split(':').collect();
        let (identity, version) = match parts.as_slice() {
            [group, artifact, version, ..]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                (
                    DeploymentIdentity {
                        group_id: (*group).to_string(),
                        artifact_id: (*artifact).to_string(),
                    },
                    ArtifactVersion::parse(version),
                )
            }
            _ => (
                DeploymentIdentity {
                    group_id: String::new(),
                    artifact_id: deployment_id.to_string(),
                },
                ArtifactVersion::default(),
            ),
        };

        ResolvedDeployment {
            identity,
            versioned: VersionedDeploymentId {
                version,
                deployment_id: deployment_id.to_string(),
            },
        }
    }
}
