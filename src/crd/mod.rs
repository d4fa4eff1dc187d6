//! Custom Resource Definitions for the composite operator
//!
//! `Cluster` is the parent; `App`, `SidecarA` and `SidecarB` are the children
//! it owns.

mod cluster;
mod component;
mod types;

pub use cluster::{Cluster, ClusterSpec, ClusterStatus, ImageReference};
pub use component::{
    App, AppSpec, Component, ComponentStatus, SidecarA, SidecarASpec, SidecarB, SidecarBSpec,
};
pub use types::{
    find_condition, is_condition_true, remove_condition, set_condition, Condition,
    ConditionStatus, CONDITION_AVAILABLE, CONDITION_PROGRESSING,
};
