//! Operator configuration
//!
//! Every flag can also be set through an `HCO_*` environment variable so the
//! Deployment manifest does not need to template command-line arguments.

use std::time::Duration;

use clap::Args;

use crate::executor::ExecutionStrategy;
use crate::store::DEFAULT_FIELD_MANAGER;

/// Command-line and environment configuration for the controller
#[derive(Args, Debug, Clone)]
pub struct OperatorConfig {
    /// How operands are scheduled within a pass
    #[arg(long, env = "HCO_STRATEGY", value_enum, default_value_t = ExecutionStrategy::Serial)]
    pub strategy: ExecutionStrategy,

    /// Delay before re-running a pass that asked to be requeued
    #[arg(long, env = "HCO_REQUEUE_INTERVAL_SECS", default_value_t = 5)]
    pub requeue_interval_secs: u64,

    /// Periodic resync after a pass that converged or is waiting
    #[arg(long, env = "HCO_RESYNC_INTERVAL_SECS", default_value_t = 300)]
    pub resync_interval_secs: u64,

    /// Delay before retrying a pass that failed
    #[arg(long, env = "HCO_ERROR_BACKOFF_SECS", default_value_t = 15)]
    pub error_backoff_secs: u64,

    /// Field manager recorded on every write
    #[arg(long, env = "HCO_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Only watch Clusters in this namespace (all namespaces when unset)
    #[arg(long, env = "HCO_NAMESPACE")]
    pub namespace: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "HCO_LOG_JSON")]
    pub log_json: bool,
}

impl OperatorConfig {
    /// Settings the reconciler needs
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            strategy: self.strategy,
            requeue_interval: Duration::from_secs(self.requeue_interval_secs),
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            field_manager: self.field_manager.clone(),
        }
    }
}

/// Timing and write settings carried in the controller context
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Operand scheduling strategy
    pub strategy: ExecutionStrategy,
    /// Requeue delay after initialization or an operand asking to requeue
    pub requeue_interval: Duration,
    /// Requeue delay after a pass that converged or is waiting on children
    pub resync_interval: Duration,
    /// Requeue delay applied by the error policy
    pub error_backoff: Duration,
    /// Field manager for writes
    pub field_manager: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Serial,
            requeue_interval: Duration::from_secs(5),
            resync_interval: Duration::from_secs(300),
            error_backoff: Duration::from_secs(15),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}
