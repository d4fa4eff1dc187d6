//! Component (child) Custom Resource Definitions
//!
//! Each Cluster owns one App, one SidecarA and one SidecarB. The three kinds
//! share a shape (an image plus status conditions) and are bound to the
//! parent through the [`Component`] trait, which tells an operand how to
//! name the child and which part of the parent spec it mirrors.

use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::cluster::ClusterSpec;
use super::types::Condition;
use crate::events::reasons;

/// A child kind created and kept in sync by a component operand
pub trait Component:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Name prefix; the child of cluster `demo` is `<prefix>-demo`
    const NAME_PREFIX: &'static str;

    /// Event reason recorded when the child is created
    const CREATED_REASON: &'static str;

    /// Image the parent spec asks for (empty = no change requested)
    fn desired_image(spec: &ClusterSpec) -> &str;

    /// Construct a child with the given name and image
    fn build(name: &str, image: &str) -> Self;

    /// Observed image
    fn image(&self) -> &str;

    /// Overwrite the image
    fn set_image(&mut self, image: &str);

    /// Status conditions reported by the child
    fn conditions(&self) -> &[Condition];

    /// Deterministic child name for a parent
    fn child_name(parent: &str) -> String {
        format!("{}-{}", Self::NAME_PREFIX, parent)
    }

    /// Kind string, for logs and errors
    fn kind_name() -> String {
        Self::kind(&()).into_owned()
    }
}

/// Observed state shared by every component kind
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Conditions reported by the component
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Specification for an App
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "darkowlzz.space",
    version = "v1",
    kind = "App",
    plural = "apps",
    namespaced,
    status = "ComponentStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// The app's container image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Specification for a SidecarA
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "darkowlzz.space",
    version = "v1",
    kind = "SidecarA",
    plural = "sidecaras",
    namespaced,
    status = "ComponentStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SidecarASpec {
    /// The sidecar's container image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Specification for a SidecarB
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "darkowlzz.space",
    version = "v1",
    kind = "SidecarB",
    plural = "sidecarbs",
    namespaced,
    status = "ComponentStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SidecarBSpec {
    /// The sidecar's container image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

macro_rules! impl_component {
    ($kind:ty, $spec:ident, $prefix:literal, $reason:expr, $field:ident) => {
        impl Component for $kind {
            const NAME_PREFIX: &'static str = $prefix;
            const CREATED_REASON: &'static str = $reason;

            fn desired_image(spec: &ClusterSpec) -> &str {
                &spec.images.$field
            }

            fn build(name: &str, image: &str) -> Self {
                <$kind>::new(
                    name,
                    $spec {
                        image: image.to_string(),
                    },
                )
            }

            fn image(&self) -> &str {
                &self.spec.image
            }

            fn set_image(&mut self, image: &str) {
                self.spec.image = image.to_string();
            }

            fn conditions(&self) -> &[Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or_default()
            }
        }
    };
}

impl_component!(App, AppSpec, "app", reasons::APP_CREATED, app);
impl_component!(SidecarA, SidecarASpec, "sidecara", reasons::SIDECAR_A_CREATED, sidecar_a);
impl_component!(SidecarB, SidecarBSpec, "sidecarb", reasons::SIDECAR_B_CREATED, sidecar_b);
