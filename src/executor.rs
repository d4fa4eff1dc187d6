//! Operand executor
//!
//! Walks operands in dependency order and runs each one's ensure followed by
//! its readiness check. An operand that is not ready holds back everything
//! that depends on it, directly or through a chain:
//!
//! - **Serial**: one operand at a time in topological order; the pass stops
//!   at the first operand that is not ready.
//! - **ParallelWithBarrier**: operands in a dependency layer run
//!   concurrently and the executor waits for the whole layer before the
//!   next. An operand in a later layer runs only if every operand it
//!   requires was ready in this pass; anything downstream of an unready
//!   operand is held.
//!
//! Each outcome is mapped through the operand's [`RequeueStrategy`] to a
//! [`PassSignal`], and the most restrictive signal among attempted operands
//! becomes the signal of the pass.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, warn};

use crate::crd::Cluster;
use crate::events::ReconcilerEvent;
use crate::graph::DependencyGraph;
use crate::operand::{Operand, RequeueStrategy};
use crate::Error;

/// How operands are scheduled within a pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutionStrategy {
    /// Strict topological order, one operand at a time
    #[default]
    Serial,
    /// Concurrent within a dependency layer, barrier between layers
    #[value(name = "parallel")]
    ParallelWithBarrier,
}

/// Result of running one operand
#[derive(Debug)]
pub enum OperandOutcome {
    /// Ensure succeeded and the child is ready
    Ready,
    /// Ensure succeeded but the child is not ready yet
    Incomplete,
    /// Ensure or the readiness check failed
    Failed(Error),
}

impl OperandOutcome {
    fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Pass-level signal, ordered from least to most restrictive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassSignal {
    /// Every operand is ready
    #[default]
    Complete,
    /// Something is pending; the next watch trigger picks it up
    Waiting,
    /// Something is pending and asked to be requeued soon
    Requeue,
    /// An operand failed; back off and retry
    Failed,
}

impl PassSignal {
    /// Signal for one operand's outcome under its strategy
    pub fn for_outcome(outcome: &OperandOutcome, strategy: RequeueStrategy) -> Self {
        match (outcome, strategy) {
            (OperandOutcome::Ready, _) => Self::Complete,
            (OperandOutcome::Incomplete, RequeueStrategy::Immediate) => Self::Requeue,
            (OperandOutcome::Incomplete, _) => Self::Waiting,
            (OperandOutcome::Failed(_), RequeueStrategy::None) => Self::Waiting,
            (OperandOutcome::Failed(_), _) => Self::Failed,
        }
    }
}

/// Accumulated result of one ensure pass
#[derive(Debug, Default)]
pub struct PassResult {
    /// Events emitted by operands, in the order they ran
    pub events: Vec<ReconcilerEvent>,
    /// Most restrictive signal among attempted operands
    pub signal: PassSignal,
    /// First error that should trigger backoff
    pub error: Option<Error>,
    /// Operand names in the order they were attempted
    pub attempted: Vec<String>,
}

impl PassResult {
    /// True when every operand ran and is ready
    pub fn is_complete(&self) -> bool {
        self.signal == PassSignal::Complete
    }

    fn record(&mut self, operand: &dyn Operand, event: Option<ReconcilerEvent>, outcome: OperandOutcome) {
        let name = operand.name().to_string();
        let strategy = operand.requeue_strategy();
        self.signal = self.signal.max(PassSignal::for_outcome(&outcome, strategy));
        self.events.extend(event);

        if let OperandOutcome::Failed(e) = outcome {
            if strategy == RequeueStrategy::None {
                warn!(operand = %name, error = %e, "operand failed, not requeueing");
                self.events.push(ReconcilerEvent::OperandFailed {
                    operand: name.clone(),
                    message: e.to_string(),
                });
            } else if self.error.is_none() {
                self.error = Some(e);
            } else {
                warn!(operand = %name, error = %e, "additional operand failure in pass");
            }
        }
        self.attempted.push(name);
    }
}

/// Runs operands according to an [`ExecutionStrategy`]
#[derive(Clone, Copy, Debug, Default)]
pub struct Executor {
    strategy: ExecutionStrategy,
}

impl Executor {
    /// Create an executor with the given strategy
    pub fn new(strategy: ExecutionStrategy) -> Self {
        Self { strategy }
    }

    /// Scheduling strategy in use
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Run one pass over `operands`, indexed the way `graph` was built
    pub async fn run(
        &self,
        operands: &[Arc<dyn Operand>],
        graph: &DependencyGraph,
        cluster: &Cluster,
        owner: &OwnerReference,
    ) -> PassResult {
        let mut result = PassResult::default();

        match self.strategy {
            ExecutionStrategy::Serial => {
                for &i in graph.order() {
                    let operand = operands[i].as_ref();
                    let (event, outcome) = run_operand(operand, cluster, owner).await;
                    let ready = outcome.is_ready();
                    result.record(operand, event, outcome);
                    if !ready {
                        log_halt(graph, operand.name());
                        break;
                    }
                }
            }
            ExecutionStrategy::ParallelWithBarrier => {
                let mut ready: HashSet<&str> = HashSet::new();
                for (depth, layer) in graph.layers().iter().enumerate() {
                    let (runnable, held): (Vec<usize>, Vec<usize>) =
                        layer.iter().partition(|&&i| {
                            graph
                                .requirements_of(operands[i].name())
                                .iter()
                                .all(|r| ready.contains(r))
                        });
                    for &i in &held {
                        debug!(
                            layer = depth,
                            operand = %operands[i].name(),
                            "requirement not ready, holding"
                        );
                    }

                    let outcomes = join_all(
                        runnable
                            .iter()
                            .map(|&i| run_operand(operands[i].as_ref(), cluster, owner)),
                    )
                    .await;

                    for (&i, (event, outcome)) in runnable.iter().zip(outcomes) {
                        let operand = operands[i].as_ref();
                        if outcome.is_ready() {
                            ready.insert(operand.name());
                        } else {
                            log_halt(graph, operand.name());
                        }
                        result.record(operand, event, outcome);
                    }
                }
            }
        }

        result
    }
}

fn log_halt(graph: &DependencyGraph, name: &str) {
    debug!(
        operand = %name,
        held = ?graph.dependents_of(name),
        "operand not ready, holding its dependents"
    );
}

async fn run_operand(
    operand: &dyn Operand,
    cluster: &Cluster,
    owner: &OwnerReference,
) -> (Option<ReconcilerEvent>, OperandOutcome) {
    let name = operand.name();
    let event = match operand.ensure(cluster, owner).await {
        Ok(event) => event,
        Err(e) => return (None, OperandOutcome::Failed(Error::operand(name, e))),
    };

    let outcome = match operand.ready_check(cluster).await {
        Ok(true) => OperandOutcome::Ready,
        Ok(false) => OperandOutcome::Incomplete,
        Err(e) => OperandOutcome::Failed(Error::operand(name, e)),
    };
    debug!(operand = %name, ?outcome, "operand ran");
    (event, outcome)
}
