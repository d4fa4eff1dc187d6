//! hco - composite operator for the Cluster CRD
//!
//! A Cluster names the images for an App and two sidecars. The controller
//! keeps one child resource per component in sync with the Cluster and folds
//! their readiness back into the Cluster's status.
//!
//! # Architecture
//!
//! Each child is driven by an *operand* that knows how to ensure it exists
//! and matches the parent, report whether it is ready, and tear it down.
//! Operands declare which other operands they require; a composite operator
//! validates those declarations into a dependency graph once at startup and
//! runs the operands in dependency order on every pass.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (Cluster, App, SidecarA, SidecarB)
//! - [`store`] - Resource store traits and the Kubernetes-backed implementation
//! - [`operand`] - Operand trait and the generic component operand
//! - [`graph`] - Operand dependency graph
//! - [`executor`] - Serial and parallel-with-barrier operand execution
//! - [`operator`] - Composite operator tying operands, graph and executor together
//! - [`drift`] - Desired-vs-observed drift detection
//! - [`controller`] - Cluster reconciliation state machine
//! - [`events`] - Kubernetes Event recording
//! - [`retry`] - Backoff for optimistic-concurrency conflicts
//! - [`config`] - Operator configuration
//! - [`telemetry`] - Tracing setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod drift;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod operand;
pub mod operator;
pub mod retry;
pub mod store;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
