//! Error types for the composite operator
//!
//! Store errors are classified so that the reconciler can tell transient
//! races (not-found, already-exists, conflict) apart from failures that must
//! be propagated to the controller's error policy.

use thiserror::Error;

/// Main error type for composite operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error that does not map onto the store taxonomy
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Resource does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (e.g. "App")
        kind: String,
        /// Namespaced name of the resource
        name: String,
    },

    /// Create raced with another writer
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Namespaced name of the resource
        name: String,
    },

    /// Update was based on a stale resource version
    #[error("conflict updating {kind} {name}")]
    Conflict {
        /// Resource kind
        kind: String,
        /// Namespaced name of the resource
        name: String,
    },

    /// Validation error for CRD specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A required metadata field is missing on a resource
    #[error("{kind} is missing required field {field}")]
    MissingField {
        /// Resource kind
        kind: String,
        /// Field path (e.g. "metadata.uid")
        field: String,
    },

    /// Two operands registered under the same name
    #[error("operand {0} registered more than once")]
    DuplicateOperand(String),

    /// An operand requires a name that is not registered
    #[error("operand {operand} requires unknown operand {requires}")]
    UnknownDependency {
        /// Operand declaring the requirement
        operand: String,
        /// The missing requirement
        requires: String,
    },

    /// Operand requirements form a cycle
    #[error("cyclic operand dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Operand names along the cycle, first name repeated at the end
        cycle: Vec<String>,
    },

    /// An operand action failed
    #[error("operand {operand} failed: {source}")]
    Operand {
        /// Name of the failing operand
        operand: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a missing-field error
    pub fn missing_field(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            kind: kind.into(),
            field: field.into(),
        }
    }

    /// Wrap an error with the name of the operand that produced it
    pub fn operand(operand: impl Into<String>, source: Error) -> Self {
        Self::Operand {
            operand: operand.into(),
            source: Box::new(source),
        }
    }

    /// Map a kube API error onto the store taxonomy
    ///
    /// 404 becomes [`Error::NotFound`], 409 with reason `AlreadyExists`
    /// becomes [`Error::AlreadyExists`], any other 409 becomes
    /// [`Error::Conflict`].
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, name),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::already_exists(kind, name)
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::conflict(kind, name),
            _ => Self::Kube(err),
        }
    }

    /// True if the resource was not found
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Operand { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True if a create lost a race with another writer
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::Operand { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }

    /// True if an update was rejected for a stale resource version
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Operand { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}
