//! Spec layer: serde shapes for the cluster and instance group documents.
//!
//! This module is intentionally separate from hook compilation and rendering.
//! It owns:
//! - Role and the role predicate
//! - Hook specs
//! - Cluster / instance group / egress proxy specs
//! - The per-role spec subsets embedded for nodeup

pub mod cluster;
pub mod hook;
pub mod role;
pub mod subset;

pub use cluster::{
    ClusterSpec, EgressProxySpec, HttpProxy, InstanceGroup, InstanceGroupSpec, load_document,
};
pub use hook::{ExecContainerAction, HookAction, HookSpec};
pub use role::{Role, applies};
pub use subset::{ClusterSpecSubset, InstanceGroupSubset};
