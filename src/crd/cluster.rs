//! Cluster Custom Resource Definition
//!
//! A Cluster is the parent resource users edit. It names the images for the
//! App and its two sidecars; the controller creates one child resource per
//! component and aggregates their readiness into the Cluster's conditions.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, CONDITION_AVAILABLE};

/// Image references for every component of a Cluster
///
/// An empty reference means "no change requested" for that component.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    /// Image for the App component
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app: String,

    /// Image for the SidecarA component
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sidecar_a: String,

    /// Image for the SidecarB component
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sidecar_b: String,
}

/// Specification for a Cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "darkowlzz.space",
    version = "v1",
    kind = "Cluster",
    plural = "clusters",
    namespaced,
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"App","type":"string","jsonPath":".spec.images.app"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Component image references
    #[serde(default)]
    pub images: ImageReference,
}

impl ClusterSpec {
    /// Validate the cluster specification
    ///
    /// Images are opaque references; the only structural rule is that a
    /// reference must not carry surrounding whitespace, which the API server
    /// would otherwise accept and the container runtime would reject.
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (field, image) in [
            ("spec.images.app", &self.images.app),
            ("spec.images.sidecarA", &self.images.sidecar_a),
            ("spec.images.sidecarB", &self.images.sidecar_b),
        ] {
            if image.trim() != image {
                return Err(crate::Error::validation(format!(
                    "{field} must not contain leading or trailing whitespace"
                )));
            }
        }
        Ok(())
    }
}

/// Status for a Cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Conditions representing the aggregated component state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ClusterStatus {
    /// True once every component has been observed ready
    pub fn is_available(&self) -> bool {
        super::types::is_condition_true(&self.conditions, CONDITION_AVAILABLE)
    }
}

impl Cluster {
    /// Conditions of this cluster, empty when status is unset
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Mutable status, created on first use
    pub fn status_mut(&mut self) -> &mut ClusterStatus {
        self.status.get_or_insert_with(ClusterStatus::default)
    }
}
