//! Composite operator
//!
//! Owns the operand set for one parent type, the dependency graph validated
//! over it, and the executor. The reconciler only talks to this type.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::info;

use crate::crd::{App, Cluster, SidecarA, SidecarB};
use crate::drift::{DriftDetector, DriftSource};
use crate::events::ReconcilerEvent;
use crate::executor::{ExecutionStrategy, Executor, PassResult};
use crate::graph::DependencyGraph;
use crate::operand::{names, ComponentOperand, Operand, RequeueStrategy};
use crate::store::ChildStore;
use crate::Error;

/// Readiness of one operand
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperandReadiness {
    /// Operand name
    pub operand: String,
    /// Whether its child is up
    pub ready: bool,
}

/// Operands, their validated graph and the executor that runs them
pub struct CompositeOperator {
    operands: Vec<Arc<dyn Operand>>,
    graph: DependencyGraph,
    executor: Executor,
}

impl CompositeOperator {
    /// Start building an operator
    pub fn builder() -> CompositeOperatorBuilder {
        CompositeOperatorBuilder::default()
    }

    /// Run one ensure pass over every operand
    pub async fn ensure(&self, cluster: &Cluster, owner: &OwnerReference) -> PassResult {
        self.executor
            .run(&self.operands, &self.graph, cluster, owner)
            .await
    }

    /// Readiness of every operand, in execution order
    pub async fn readiness(&self, cluster: &Cluster) -> Result<Vec<OperandReadiness>, Error> {
        let mut out = Vec::with_capacity(self.operands.len());
        for &i in self.graph.order() {
            let operand = &self.operands[i];
            let ready = operand
                .ready_check(cluster)
                .await
                .map_err(|e| Error::operand(operand.name(), e))?;
            out.push(OperandReadiness {
                operand: operand.name().to_string(),
                ready,
            });
        }
        Ok(out)
    }

    /// Run every operand's teardown in reverse dependency order
    pub async fn cleanup(&self, cluster: &Cluster) -> Result<Vec<ReconcilerEvent>, Error> {
        let mut events = Vec::new();
        for &i in self.graph.order().iter().rev() {
            let operand = &self.operands[i];
            if let Some(event) = operand
                .delete(cluster)
                .await
                .map_err(|e| Error::operand(operand.name(), e))?
            {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Operand names in execution order
    pub fn operand_names(&self) -> Vec<&str> {
        self.graph.ordered_names()
    }

    /// Scheduling strategy in use
    pub fn strategy(&self) -> ExecutionStrategy {
        self.executor.strategy()
    }
}

/// Builder for [`CompositeOperator`]
///
/// ```ignore
/// let operator = CompositeOperator::builder()
///     .operand(app)
///     .operand(sidecar_a)
///     .strategy(ExecutionStrategy::ParallelWithBarrier)
///     .build()?;
/// ```
#[derive(Default)]
pub struct CompositeOperatorBuilder {
    operands: Vec<Arc<dyn Operand>>,
    strategy: ExecutionStrategy,
}

impl CompositeOperatorBuilder {
    /// Register an operand; registration order breaks ordering ties
    pub fn operand(mut self, operand: Arc<dyn Operand>) -> Self {
        self.operands.push(operand);
        self
    }

    /// Set the execution strategy
    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Validate the dependency graph and build the operator
    ///
    /// Fails on duplicate names, unknown requirements and cycles.
    pub fn build(self) -> Result<CompositeOperator, Error> {
        let graph = DependencyGraph::build(
            self.operands
                .iter()
                .map(|o| (o.name().to_string(), o.requires().to_vec())),
        )?;
        info!(
            operands = ?graph.ordered_names(),
            strategy = ?self.strategy,
            "composite operator ready"
        );
        Ok(CompositeOperator {
            operands: self.operands,
            graph,
            executor: Executor::new(self.strategy),
        })
    }
}

/// The operator and drift detector for a Cluster: App first, then both
/// sidecars, each requiring App
pub fn default_composition<S>(
    store: Arc<S>,
    strategy: ExecutionStrategy,
) -> Result<(CompositeOperator, DriftDetector), Error>
where
    S: ChildStore<App> + ChildStore<SidecarA> + ChildStore<SidecarB> + 'static,
{
    let app = Arc::new(
        ComponentOperand::<App>::new(names::APP, store.clone())
            .with_requeue_strategy(RequeueStrategy::OnError),
    );
    let sidecar_a = Arc::new(
        ComponentOperand::<SidecarA>::new(names::SIDECAR_A, store.clone())
            .with_requires([names::APP])
            .with_requeue_strategy(RequeueStrategy::OnError),
    );
    let sidecar_b = Arc::new(
        ComponentOperand::<SidecarB>::new(names::SIDECAR_B, store)
            .with_requires([names::APP])
            .with_requeue_strategy(RequeueStrategy::OnError),
    );

    let operator = CompositeOperator::builder()
        .operand(app.clone())
        .operand(sidecar_a.clone())
        .operand(sidecar_b.clone())
        .strategy(strategy)
        .build()?;

    let sources: Vec<Arc<dyn DriftSource>> = vec![app, sidecar_a, sidecar_b];
    Ok((operator, DriftDetector::new(sources)))
}
