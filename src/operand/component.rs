//! Generic operand for a component child (App, SidecarA, SidecarB)

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use tracing::{debug, info};

use super::{Operand, RequeueStrategy};
use crate::crd::{find_condition, Cluster, Component, CONDITION_AVAILABLE};
use crate::drift::{image_drifted, Drift, DriftSource, IMAGE_FIELD};
use crate::events::ReconcilerEvent;
use crate::retry::{retry_with_backoff_if, RetryConfig};
use crate::store::ChildStore;
use crate::Error;

/// Keeps one child of kind `K` in sync with the parent's desired image
pub struct ComponentOperand<K: Component> {
    name: String,
    requires: Vec<String>,
    requeue_strategy: RequeueStrategy,
    retry: RetryConfig,
    store: Arc<dyn ChildStore<K>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Component> ComponentOperand<K> {
    /// Create an operand with no requirements and the default requeue
    /// strategy
    pub fn new(name: impl Into<String>, store: Arc<dyn ChildStore<K>>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            requeue_strategy: RequeueStrategy::default(),
            retry: RetryConfig::default(),
            store,
            _kind: PhantomData,
        }
    }

    /// Declare the operands this one requires
    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }

    /// Set the requeue strategy
    pub fn with_requeue_strategy(mut self, strategy: RequeueStrategy) -> Self {
        self.requeue_strategy = strategy;
        self
    }

    /// Set the backoff used when an update loses a conflict
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn observe(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        match self.store.get(namespace, name).await {
            Ok(child) => Ok(child),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Child built from the parent's spec, labels and owner reference
    fn desired(&self, cluster: &Cluster, namespace: &str, owner: &OwnerReference) -> K {
        let mut child = K::build(
            &K::child_name(&cluster.name_any()),
            K::desired_image(&cluster.spec),
        );
        let meta = child.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.labels = cluster.metadata.labels.clone();
        meta.owner_references = Some(vec![owner.clone()]);
        child
    }

    /// Bring the child's image to `desired`, starting from `cached` and
    /// re-reading on later attempts. Returns the previous image when an
    /// update was written.
    async fn update_image(
        &self,
        namespace: &str,
        name: &str,
        cached: Option<K>,
        desired: &str,
    ) -> Result<Option<String>, Error> {
        let current = match cached {
            Some(child) => Some(child),
            None => self.observe(namespace, name).await?,
        };
        let Some(mut current) = current else {
            return Ok(None);
        };

        let from = current.image().to_string();
        if !image_drifted(desired, &from) {
            return Ok(None);
        }
        current.set_image(desired);
        self.store.update(namespace, &current).await?;
        Ok(Some(from))
    }
}

fn namespace_of(cluster: &Cluster) -> Result<String, Error> {
    cluster
        .namespace()
        .ok_or_else(|| Error::missing_field("Cluster", "metadata.namespace"))
}

#[async_trait]
impl<K: Component> Operand for ComponentOperand<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    fn requeue_strategy(&self) -> RequeueStrategy {
        self.requeue_strategy
    }

    async fn ensure(
        &self,
        cluster: &Cluster,
        owner: &OwnerReference,
    ) -> Result<Option<ReconcilerEvent>, Error> {
        let namespace = namespace_of(cluster)?;
        let name = K::child_name(&cluster.name_any());
        let kind = K::kind_name();

        let existing = match self.observe(&namespace, &name).await? {
            Some(child) => child,
            None => {
                let child = self.desired(cluster, &namespace, owner);
                match self.store.create(&namespace, &child).await {
                    Ok(_) => {
                        info!(operand = %self.name, %kind, child = %name, "created component");
                        return Ok(Some(ReconcilerEvent::ComponentCreated {
                            kind,
                            name,
                            reason: K::CREATED_REASON.to_string(),
                        }));
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(
                            operand = %self.name,
                            %kind,
                            child = %name,
                            "component created concurrently, treating as existing"
                        );
                        match self.observe(&namespace, &name).await? {
                            Some(child) => child,
                            None => return Ok(None),
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let desired = K::desired_image(&cluster.spec);
        if !image_drifted(desired, existing.image()) {
            return Ok(None);
        }

        let mut cached = Some(existing);
        let updated = retry_with_backoff_if(
            &self.retry,
            &format!("update {kind} {namespace}/{name}"),
            Error::is_conflict,
            || self.update_image(&namespace, &name, cached.take(), desired),
        )
        .await;

        match updated {
            Ok(Some(from)) => {
                info!(operand = %self.name, %kind, child = %name, %from, to = %desired, "corrected component drift");
                Ok(Some(ReconcilerEvent::ComponentUpdated {
                    kind,
                    name,
                    from,
                    to: desired.to_string(),
                }))
            }
            Ok(None) => Ok(None),
            // Deleted underneath us; the next pass recreates it
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn ready_check(&self, cluster: &Cluster) -> Result<bool, Error> {
        let namespace = namespace_of(cluster)?;
        let name = K::child_name(&cluster.name_any());
        let ready = self.observe(&namespace, &name).await?.is_some_and(|child| {
            find_condition(child.conditions(), CONDITION_AVAILABLE).map_or(true, |c| c.is_true())
        });
        debug!(operand = %self.name, child = %name, ready, "component readiness");
        Ok(ready)
    }

    async fn delete(&self, _cluster: &Cluster) -> Result<Option<ReconcilerEvent>, Error> {
        Ok(None)
    }
}

#[async_trait]
impl<K: Component> DriftSource for ComponentOperand<K> {
    fn component(&self) -> String {
        K::kind_name()
    }

    async fn drift(&self, cluster: &Cluster) -> Result<Option<Drift>, Error> {
        let namespace = namespace_of(cluster)?;
        let name = K::child_name(&cluster.name_any());
        let desired = K::desired_image(&cluster.spec);

        Ok(match self.observe(&namespace, &name).await? {
            None => Some(Drift::missing(K::kind_name(), desired)),
            Some(child) if image_drifted(desired, child.image()) => Some(Drift {
                component: K::kind_name(),
                field: IMAGE_FIELD.to_string(),
                observed: Some(child.image().to_string()),
                desired: desired.to_string(),
            }),
            Some(_) => None,
        })
    }
}
