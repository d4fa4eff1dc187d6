//! Controller for the Cluster CRD
//!
//! Follows the Kubernetes controller pattern: each pass observes the
//! Cluster and its children, acts through the composite operator, and
//! writes the aggregated result back to the Cluster's status.

mod cluster;
pub mod status;

pub use cluster::{error_policy, reconcile, Context, ContextBuilder, CONTROLLER_NAME};
