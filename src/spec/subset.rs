//! The parts of the cluster and instance group specs that nodeup reads on the
//! instance, cut down to what applies to one role.

use crate::error::{RenderError, Result};
use crate::spec::{ClusterSpec, HookSpec, InstanceGroup, Role, applies};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Written to `cluster_spec.yaml`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpecSubset<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<&'a Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_proxy: Option<&'a Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<&'a Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_kubelet: Option<&'a Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<&'a HookSpec>,
}

/// Written to `ig_spec.yaml`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroupSubset<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<&'a Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_labels: Option<&'a BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<&'a [String]>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<&'a HookSpec>,
}

impl<'a> ClusterSpecSubset<'a> {
    pub fn for_role(cluster: &'a ClusterSpec, role: Role) -> Self {
        let master_kubelet = match role {
            Role::Master => cluster.master_kubelet.as_ref(),
            Role::Node | Role::Bastion => None,
        };
        Self {
            docker: cluster.docker.as_ref(),
            kube_proxy: cluster.kube_proxy.as_ref(),
            kubelet: cluster.kubelet.as_ref(),
            master_kubelet,
            hooks: relevant_hooks(&cluster.hooks, role),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|source| RenderError::Serialize {
            what: "cluster spec",
            source,
        })
    }
}

impl<'a> InstanceGroupSubset<'a> {
    pub fn for_group(group: &'a InstanceGroup) -> Self {
        let spec = &group.spec;
        Self {
            kubelet: spec.kubelet.as_ref(),
            node_labels: Some(&spec.node_labels).filter(|labels| !labels.is_empty()),
            taints: Some(spec.taints.as_slice()).filter(|taints| !taints.is_empty()),
            hooks: relevant_hooks(&spec.hooks, spec.role),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|source| RenderError::Serialize {
            what: "instance group spec",
            source,
        })
    }
}

/// Hooks that apply to `role`, as declared (roles included).
fn relevant_hooks(hooks: &[HookSpec], role: Role) -> Vec<&HookSpec> {
    hooks.iter().filter(|hook| applies(&hook.roles, role)).collect()
}
