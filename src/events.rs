//! Kubernetes Event recording for the composite operator.
//!
//! Operands describe what they did as [`ReconcilerEvent`] values. Those are a
//! side channel: the reconciler hands them to an [`EventPublisher`] after the
//! operate stage, and nothing in the control flow depends on them.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Something an operand or the reconciler did that users should see
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcilerEvent {
    /// A component child was created
    ComponentCreated {
        /// Child kind (e.g. "App")
        kind: String,
        /// Child name
        name: String,
        /// Kind-specific reason (e.g. "AppReady")
        reason: String,
    },
    /// A drifted component child was brought back to the desired image
    ComponentUpdated {
        /// Child kind
        kind: String,
        /// Child name
        name: String,
        /// Image observed before the update
        from: String,
        /// Image written
        to: String,
    },
    /// A component child was torn down explicitly
    ComponentDeleted {
        /// Child kind
        kind: String,
        /// Child name
        name: String,
    },
    /// An operand failed but its requeue strategy suppressed backoff
    OperandFailed {
        /// Operand name
        operand: String,
        /// Error text
        message: String,
    },
    /// Every component is ready
    ClusterReady {
        /// Cluster name
        name: String,
    },
}

impl ReconcilerEvent {
    /// Normal or Warning
    pub fn type_(&self) -> EventType {
        match self {
            Self::OperandFailed { .. } => EventType::Warning,
            _ => EventType::Normal,
        }
    }

    /// Machine-readable reason
    pub fn reason(&self) -> &str {
        match self {
            Self::ComponentCreated { reason, .. } => reason,
            Self::ComponentUpdated { .. } => reasons::COMPONENT_UPDATED,
            Self::ComponentDeleted { .. } => reasons::COMPONENT_DELETED,
            Self::OperandFailed { .. } => reasons::OPERAND_FAILED,
            Self::ClusterReady { .. } => reasons::CLUSTER_READY,
        }
    }

    /// Action column value
    pub fn action(&self) -> &'static str {
        match self {
            Self::ComponentCreated { .. } => actions::CREATE,
            Self::ComponentUpdated { .. } => actions::UPDATE,
            Self::ComponentDeleted { .. } => actions::DELETE,
            Self::OperandFailed { .. } | Self::ClusterReady { .. } => actions::RECONCILE,
        }
    }

    /// Human-readable message
    pub fn note(&self) -> String {
        match self {
            Self::ComponentCreated { kind, name, .. } => {
                format!("Created {kind} with name {name}")
            }
            Self::ComponentUpdated {
                kind,
                name,
                from,
                to,
            } => format!("Updated {kind} {name} image from {from:?} to {to:?}"),
            Self::ComponentDeleted { kind, name } => format!("Deleted {kind} {name}"),
            Self::OperandFailed { operand, message } => {
                format!("Operand {operand} failed: {message}")
            }
            Self::ClusterReady { name } => format!("Cluster {name} ready"),
        }
    }
}

/// Trait for publishing Kubernetes Events.
///
/// Implementations are expected to be fire-and-forget: `publish()` logs a
/// warning on failure but never returns an error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "AppReady")
    /// * `action` - What action was taken (e.g. "Create")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );

    /// Publish a [`ReconcilerEvent`]
    async fn record(&self, resource_ref: &ObjectReference, event: &ReconcilerEvent) {
        self.publish(
            resource_ref,
            event.type_(),
            event.reason(),
            event.action(),
            Some(event.note()),
        )
        .await;
    }
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher for the given controller name.
    ///
    /// The controller name appears as the "reportingComponent" on Events.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// App child created
    pub const APP_CREATED: &str = "AppReady";
    /// SidecarA child created
    pub const SIDECAR_A_CREATED: &str = "SidecarAReady";
    /// SidecarB child created
    pub const SIDECAR_B_CREATED: &str = "SidecarBReady";
    /// A drifted child was updated
    pub const COMPONENT_UPDATED: &str = "ComponentUpdated";
    /// A child was deleted explicitly
    pub const COMPONENT_DELETED: &str = "ComponentDeleted";
    /// An operand failed without triggering backoff
    pub const OPERAND_FAILED: &str = "OperandFailed";
    /// Every component is ready
    pub const CLUSTER_READY: &str = "ClusterReady";
}

/// Well-known event action strings.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Creating a child
    pub const CREATE: &str = "Create";
    /// Updating a child
    pub const UPDATE: &str = "Update";
    /// Deleting a child
    pub const DELETE: &str = "Delete";
}
