//! Cluster status aggregation and diff-aware patching
//!
//! `Progressing` and `Available` are mutually exclusive: a Cluster is either
//! still converging or every component is up. Transition times are kept
//! when a condition's status does not change, so a pass that observes the
//! same world produces a status equal to the one it fetched and no write is
//! issued.

use serde_json::{Map, Value};

use crate::crd::{
    find_condition, remove_condition, set_condition, Cluster, ClusterStatus, Condition,
    ConditionStatus, CONDITION_AVAILABLE, CONDITION_PROGRESSING,
};
use crate::drift::Drift;
use crate::operator::OperandReadiness;
use crate::Error;

/// Condition reasons written by the reconciler
pub mod reasons {
    /// First pass; no operand work done yet
    pub const INITIALIZING: &str = "Initializing";
    /// Operands ran and something is still pending
    pub const RECONCILING: &str = "Reconciling";
    /// Every component is ready
    pub const READY: &str = "Ready";
    /// The Cluster spec failed validation
    pub const INVALID_SPEC: &str = "InvalidSpec";
}

/// Neither marker condition has been written yet
pub fn is_uninitialized(cluster: &Cluster) -> bool {
    let conditions = cluster.conditions();
    find_condition(conditions, CONDITION_AVAILABLE).is_none()
        && find_condition(conditions, CONDITION_PROGRESSING).is_none()
}

/// Mark a new Cluster as progressing
pub fn initialize(cluster: &mut Cluster) {
    set_condition(
        &mut cluster.status_mut().conditions,
        Condition::new(
            CONDITION_PROGRESSING,
            ConditionStatus::True,
            reasons::INITIALIZING,
            "Reconciling components",
        ),
    );
}

/// Record a validation failure; the Cluster waits for a spec change
pub fn mark_invalid(cluster: &mut Cluster, message: &str) {
    let conditions = &mut cluster.status_mut().conditions;
    remove_condition(conditions, CONDITION_AVAILABLE);
    set_condition(
        conditions,
        Condition::new(
            CONDITION_PROGRESSING,
            ConditionStatus::False,
            reasons::INVALID_SPEC,
            message,
        ),
    );
}

/// Fold operand readiness and drift into the Cluster's conditions
///
/// Returns true when this call moved the Cluster to `Available`.
pub fn aggregate(
    cluster: &mut Cluster,
    readiness: &[OperandReadiness],
    drift: Option<&Drift>,
) -> bool {
    let was_available = cluster
        .status
        .as_ref()
        .is_some_and(ClusterStatus::is_available);
    let conditions = &mut cluster.status_mut().conditions;

    match pending_message(readiness, drift) {
        None => {
            remove_condition(conditions, CONDITION_PROGRESSING);
            set_condition(
                conditions,
                Condition::new(
                    CONDITION_AVAILABLE,
                    ConditionStatus::True,
                    reasons::READY,
                    reasons::READY,
                ),
            );
            !was_available
        }
        Some(message) => {
            remove_condition(conditions, CONDITION_AVAILABLE);
            set_condition(
                conditions,
                Condition::new(
                    CONDITION_PROGRESSING,
                    ConditionStatus::True,
                    reasons::RECONCILING,
                    message,
                ),
            );
            false
        }
    }
}

/// What the Cluster is waiting on, naming the first pending component
fn pending_message(readiness: &[OperandReadiness], drift: Option<&Drift>) -> Option<String> {
    if let Some(pending) = readiness.iter().find(|r| !r.ready) {
        return Some(format!("Waiting for {} to become ready", pending.operand));
    }
    drift.map(|d| format!("Waiting for {d}"))
}

/// JSON merge patch turning `original`'s status into `current`'s
///
/// `None` when the two are structurally equal, so callers can skip the
/// write entirely.
pub fn status_merge_patch(original: &Cluster, current: &Cluster) -> Result<Option<Value>, Error> {
    let before = original.status.clone().unwrap_or_default();
    let after = current.status.clone().unwrap_or_default();
    if before == after {
        return Ok(None);
    }

    let before = serde_json::to_value(&before).map_err(|e| Error::serialization(e.to_string()))?;
    let after = serde_json::to_value(&after).map_err(|e| Error::serialization(e.to_string()))?;
    Ok(merge_diff(&before, &after))
}

/// RFC 7386 diff: changed or added fields carry their new value, removed
/// fields are set to null, arrays are replaced whole
fn merge_diff(before: &Value, after: &Value) -> Option<Value> {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut patch = Map::new();
            for (key, value) in a {
                match b.get(key) {
                    Some(old) => {
                        if let Some(diff) = merge_diff(old, value) {
                            patch.insert(key.clone(), diff);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in b.keys().filter(|k| !a.contains_key(*k)) {
                patch.insert(key.clone(), Value::Null);
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if before == after => None,
        _ => Some(after.clone()),
    }
}
