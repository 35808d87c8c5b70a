//! Cluster and instance group documents.
//!
//! Only the fields the bootstrap script needs are modelled; anything else in a
//! full manifest is ignored on load. Component configs (docker, kubelet,
//! kube-proxy) are handed to nodeup untouched, so they stay opaque YAML.

use crate::spec::{HookSpec, Role};
use anyhow::Context;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_proxy: Option<EgressProxySpec>,

    /// Hooks for every instance group in the cluster.
    #[serde(default)]
    pub hooks: Vec<HookSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_proxy: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<Value>,

    /// Kubelet settings that only masters get.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_kubelet: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroup {
    #[serde(default)]
    pub name: String,

    pub spec: InstanceGroupSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroupSpec {
    pub role: Role,

    #[serde(default)]
    pub hooks: Vec<HookSpec>,

    /// Overrides the cluster kubelet config for this group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<String>,
}

impl InstanceGroupSpec {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            hooks: Vec::new(),
            kubelet: None,
            node_labels: BTreeMap::new(),
            taints: Vec::new(),
        }
    }
}

impl InstanceGroup {
    pub fn role(&self) -> Role {
        self.spec.role
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressProxySpec {
    pub http_proxy: HttpProxy,

    /// Hosts and CIDRs that bypass the proxy, in caller order.
    #[serde(default, deserialize_with = "deserialize_excludes")]
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpProxy {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,
}

/// Accept either `excludes: [a, b]` or the comma-joined `excludes: "a,b"`.
fn deserialize_excludes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Excludes {
        Joined(String),
        List(Vec<String>),
    }

    let list = match Excludes::deserialize(deserializer)? {
        Excludes::Joined(s) => s.split(',').map(str::to_string).collect(),
        Excludes::List(v) => v,
    };
    Ok(list.into_iter().filter(|s| !s.is_empty()).collect())
}

/// Load a JSON (`.json`) or YAML (anything else) document from disk.
pub fn load_document<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parse JSON {}", path.display()))
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parse YAML {}", path.display()))
    }
}
