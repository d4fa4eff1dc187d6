//! Drift detection between the parent's desired images and the children
//!
//! A child that does not exist yet counts as drifted: it has not converged,
//! and the corrective action (another ensure pass) is the same as for a
//! child whose image diverged. Sources are checked in a fixed order and the
//! first drift found wins.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::crd::Cluster;
use crate::Error;

/// Field compared for every component child
pub const IMAGE_FIELD: &str = "spec.image";

/// A single divergence between desired and observed state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Drift {
    /// Component kind (e.g. "App")
    pub component: String,
    /// Field path that diverged
    pub field: String,
    /// Observed value; `None` when the child does not exist
    pub observed: Option<String>,
    /// Value implied by the parent spec
    pub desired: String,
}

impl Drift {
    /// Drift reported for a child that has not been created
    pub fn missing(component: impl Into<String>, desired: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            field: IMAGE_FIELD.to_string(),
            observed: None,
            desired: desired.into(),
        }
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.observed {
            None => write!(f, "{} not created", self.component),
            Some(observed) => write!(
                f,
                "{} {} is {:?}, want {:?}",
                self.component, self.field, observed, self.desired
            ),
        }
    }
}

/// True when `desired` asks for a change and `observed` does not match it
///
/// An empty desired image means "no change requested".
pub fn image_drifted(desired: &str, observed: &str) -> bool {
    !desired.is_empty() && desired != observed
}

/// Something that can compare one child against the parent spec
#[async_trait]
pub trait DriftSource: Send + Sync {
    /// Component kind this source checks
    fn component(&self) -> String;

    /// Report the drift for this component, if any
    async fn drift(&self, cluster: &Cluster) -> Result<Option<Drift>, Error>;
}

/// Ordered set of drift sources
#[derive(Clone, Default)]
pub struct DriftDetector {
    sources: Vec<Arc<dyn DriftSource>>,
}

impl DriftDetector {
    /// Create a detector checking `sources` in the given order
    pub fn new(sources: Vec<Arc<dyn DriftSource>>) -> Self {
        Self { sources }
    }

    /// First drift found, checking sources in order
    pub async fn detect(&self, cluster: &Cluster) -> Result<Option<Drift>, Error> {
        for source in &self.sources {
            if let Some(drift) = source.drift(cluster).await? {
                return Ok(Some(drift));
            }
        }
        Ok(None)
    }

    /// Component kinds in check order
    pub fn components(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.component()).collect()
    }
}
