//! Operands: units of work that each keep one child in sync with the parent
//!
//! An operand is registered with a composite operator under a unique name,
//! declares the operands it requires, and tells the executor how to react
//! when it is incomplete or fails through its [`RequeueStrategy`].

mod component;

pub use component::ComponentOperand;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use crate::crd::Cluster;
use crate::events::ReconcilerEvent;
use crate::Error;

/// Operand names used by the default composition
pub mod names {
    /// Operand owning the App child
    pub const APP: &str = "app";
    /// Operand owning the SidecarA child
    pub const SIDECAR_A: &str = "sidecar-a";
    /// Operand owning the SidecarB child
    pub const SIDECAR_B: &str = "sidecar-b";
}

/// What the executor does when an operand is incomplete or fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequeueStrategy {
    /// Requeue after the short requeue interval while incomplete; back off
    /// on error
    Immediate,
    /// Wait for the next watch trigger while incomplete; back off on error
    #[default]
    OnError,
    /// Never requeue on this operand's account. Errors are reported as
    /// warning events and left for the next trigger
    None,
}

/// One child component's ensure, readiness and teardown logic
///
/// Every method must be safe to abandon midway and to call again from
/// scratch on the next pass.
#[async_trait]
pub trait Operand: Send + Sync {
    /// Unique name within a composite operator
    fn name(&self) -> &str;

    /// Names of operands that must be ready before this one runs
    fn requires(&self) -> &[String];

    /// Reaction to incompleteness and failure
    fn requeue_strategy(&self) -> RequeueStrategy;

    /// Create the child if it is absent, correct it if it has drifted
    ///
    /// Returns an event describing the change, or `None` when the child
    /// already matched.
    async fn ensure(
        &self,
        cluster: &Cluster,
        owner: &OwnerReference,
    ) -> Result<Option<ReconcilerEvent>, Error>;

    /// Whether the child is up
    async fn ready_check(&self, cluster: &Cluster) -> Result<bool, Error>;

    /// Explicit teardown for children that owner-reference cascading
    /// deletion does not cover
    async fn delete(&self, cluster: &Cluster) -> Result<Option<ReconcilerEvent>, Error>;
}
