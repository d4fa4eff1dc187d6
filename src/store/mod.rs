//! Resource store abstraction
//!
//! The reconciler and operands only ever issue single-object reads and
//! writes. These traits describe exactly that surface so tests can swap the
//! API server for a mock or an in-memory store.

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{Cluster, Component};
use crate::Error;

/// Default field manager for writes issued by the controller
pub const DEFAULT_FIELD_MANAGER: &str = "hco-controller";

/// Parent resource access
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Read a Cluster; `None` if it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error>;

    /// Apply a JSON merge patch to the Cluster's status subresource
    ///
    /// `patch` is the body of the `status` field only.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), Error>;
}

/// Child resource access for one component kind
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChildStore<K: Component>: Send + Sync {
    /// Read a child; `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>;

    /// Create a child; fails with [`Error::AlreadyExists`] on a race
    async fn create(&self, namespace: &str, child: &K) -> Result<K, Error>;

    /// Replace a child; fails with [`Error::Conflict`] if `child` is stale
    async fn update(&self, namespace: &str, child: &K) -> Result<K, Error>;
}

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    /// Create a store writing with the given field manager
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| Error::from_kube(e, "Cluster", &key(namespace, name)))
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), Error> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        let body = serde_json::json!({ "status": patch });
        debug!(cluster = %name, %namespace, patch = %body, "patching cluster status");
        api.patch_status(
            name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&body),
        )
        .await
        .map_err(|e| Error::from_kube(e, "Cluster", &key(namespace, name)))?;
        Ok(())
    }
}

#[async_trait]
impl<K: Component> ChildStore<K> for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| Error::from_kube(e, &K::kind_name(), &key(namespace, name)))
    }

    async fn create(&self, namespace: &str, child: &K) -> Result<K, Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&self.post_params(), child)
            .await
            .map_err(|e| Error::from_kube(e, &K::kind_name(), &key(namespace, &child.name_any())))
    }

    async fn update(&self, namespace: &str, child: &K) -> Result<K, Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let name = child.name_any();
        api.replace(&name, &self.post_params(), child)
            .await
            .map_err(|e| Error::from_kube(e, &K::kind_name(), &key(namespace, &name)))
    }
}
