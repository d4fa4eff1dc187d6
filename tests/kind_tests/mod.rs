//! Integration tests for the hco operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how a Cluster and its components behave against a real API server.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading and updating Cluster
//!   resources through the Kubernetes API
//!
//! - `composite_lifecycle`: Stories about how the reconciler drives a
//!   Cluster from creation to Available, rolls image changes into its
//!   children and lets garbage collection remove them
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod helpers;
