//! Cluster reconciliation
//!
//! One pass walks a fixed sequence of stages:
//!
//! ```text
//! Fetch -> (deleting? Cleanup) -> Validate -> (uninitialized? Initialize)
//!       -> Operate -> UpdateStatus -> PatchStatus
//! ```
//!
//! The pass works on a copy of the Cluster fetched at the start and only
//! writes status when it differs from that snapshot. Status-only writes do
//! not re-trigger the controller (the watch is filtered on generation), so
//! stages that need another pass ask for one through the returned `Action`.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::status;
use crate::config::ReconcileConfig;
use crate::crd::Cluster;
use crate::drift::DriftDetector;
use crate::events::{EventPublisher, KubeEventPublisher, ReconcilerEvent};
use crate::executor::PassSignal;
use crate::operator::{default_composition, CompositeOperator};
use crate::store::{ClusterStore, KubeStore};
use crate::Error;

/// Name reported on Events emitted by the controller
pub const CONTROLLER_NAME: &str = "hco-controller";

/// Controller context shared by every reconciliation
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .config(operator_config.reconcile_config())
///     .build()?;
/// ```
pub struct Context {
    /// Parent resource access (trait object for testability)
    pub clusters: Arc<dyn ClusterStore>,
    /// Operands for the Cluster's children
    pub operator: Arc<CompositeOperator>,
    /// Desired-vs-observed comparison over the same children
    pub drift: Arc<DriftDetector>,
    /// Event sink
    pub events: Arc<dyn EventPublisher>,
    /// Timing and write settings
    pub config: ReconcileConfig,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context from already-built parts
    ///
    /// Unit tests use this to plug in an in-memory store and scripted
    /// operands. Production code should use [`Context::builder`].
    #[cfg(test)]
    pub fn for_testing(
        clusters: Arc<dyn ClusterStore>,
        operator: CompositeOperator,
        drift: DriftDetector,
        events: Arc<dyn EventPublisher>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            clusters,
            operator: Arc::new(operator),
            drift: Arc::new(drift),
            events,
            config,
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    client: Client,
    config: ReconcileConfig,
    events: Option<Arc<dyn EventPublisher>>,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            config: ReconcileConfig::default(),
            events: None,
        }
    }

    /// Set timing, strategy and field manager
    pub fn config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the event publisher
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the Context
    ///
    /// Fails if the operand composition does not form a valid dependency
    /// graph.
    pub fn build(self) -> Result<Context, Error> {
        let store = Arc::new(KubeStore::new(
            self.client.clone(),
            self.config.field_manager.clone(),
        ));
        let (operator, drift) = default_composition(store.clone(), self.config.strategy)?;

        let clusters: Arc<dyn ClusterStore> = store;
        let client = self.client;
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)));

        Ok(Context {
            clusters,
            operator: Arc::new(operator),
            drift: Arc::new(drift),
            events,
            config: self.config,
        })
    }
}

/// Reconcile a Cluster resource
///
/// # Returns
///
/// An `Action` saying when to look at the Cluster again, or an error that
/// the controller hands to [`error_policy`].
#[instrument(
    skip(cluster, ctx),
    fields(cluster = %cluster.name_any(), namespace = %cluster.namespace().unwrap_or_default())
)]
pub async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name_any();
    let namespace = cluster
        .namespace()
        .ok_or_else(|| Error::missing_field("Cluster", "metadata.namespace"))?;

    // Fetch
    let Some(original) = ctx.clusters.get_cluster(&namespace, &name).await? else {
        debug!("cluster no longer exists, nothing to do");
        return Ok(Action::await_change());
    };
    let mut instance = original.clone();

    // Cleanup
    if instance.metadata.deletion_timestamp.is_some() {
        info!("cluster is being deleted, running operand cleanup");
        let events = ctx.operator.cleanup(&instance).await?;
        publish(&ctx, &instance, &events).await;
        return Ok(Action::await_change());
    }

    // Validate
    if let Err(e) = instance.spec.validate() {
        warn!(error = %e, "cluster validation failed");
        status::mark_invalid(&mut instance, &e.to_string());
        patch_status(&ctx, &original, &instance).await?;
        // Only a spec change can fix this
        return Ok(Action::await_change());
    }

    // Initialize
    if status::is_uninitialized(&instance) {
        info!("initializing cluster status");
        status::initialize(&mut instance);
        patch_status(&ctx, &original, &instance).await?;
        return Ok(Action::requeue(ctx.config.requeue_interval));
    }

    // Operate
    let owner = instance
        .controller_owner_ref(&())
        .ok_or_else(|| Error::missing_field("Cluster", "metadata.uid"))?;
    let pass = ctx.operator.ensure(&instance, &owner).await;
    debug!(
        attempted = ?pass.attempted,
        signal = ?pass.signal,
        events = pass.events.len(),
        "operate stage finished"
    );
    publish(&ctx, &instance, &pass.events).await;

    // UpdateStatus
    let readiness = ctx.operator.readiness(&instance).await?;
    let drift = ctx.drift.detect(&instance).await?;
    if let Some(ref d) = drift {
        debug!(drift = %d, "components not converged");
    }
    let became_ready = status::aggregate(&mut instance, &readiness, drift.as_ref());

    // PatchStatus
    patch_status(&ctx, &original, &instance).await?;
    if became_ready {
        info!("all components ready");
        publish(
            &ctx,
            &instance,
            &[ReconcilerEvent::ClusterReady { name: name.clone() }],
        )
        .await;
    }

    if let Some(e) = pass.error {
        return Err(e);
    }
    Ok(action_for(pass.signal, &ctx.config))
}

/// Error policy for the controller
///
/// Called when reconciliation fails; requeues after the configured backoff.
pub fn error_policy(cluster: Arc<Cluster>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        cluster = %cluster.name_any(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.error_backoff)
}

fn action_for(signal: PassSignal, config: &ReconcileConfig) -> Action {
    match signal {
        PassSignal::Complete | PassSignal::Waiting => Action::requeue(config.resync_interval),
        PassSignal::Requeue => Action::requeue(config.requeue_interval),
        PassSignal::Failed => Action::requeue(config.error_backoff),
    }
}

/// Write status if it differs from the fetched snapshot
async fn patch_status(ctx: &Context, original: &Cluster, instance: &Cluster) -> Result<(), Error> {
    let Some(patch) = status::status_merge_patch(original, instance)? else {
        debug!("status unchanged, skipping patch");
        return Ok(());
    };
    ctx.clusters
        .patch_status(
            &instance.namespace().unwrap_or_default(),
            &instance.name_any(),
            &patch,
        )
        .await
}

async fn publish(ctx: &Context, cluster: &Cluster, events: &[ReconcilerEvent]) {
    if events.is_empty() {
        return;
    }
    let object_ref = cluster.object_ref(&());
    for event in events {
        ctx.events.record(&object_ref, event).await;
    }
}
