//! Hook spec as it appears in cluster and instance group manifests.
//!
//! YAML shape:
//! hooks:
//! - name: disable-update-engine.service
//!   roles: [Master]                 // optional, empty = every role
//!   before: [kubelet.service]       // optional ordering hints
//!   requires: [docker.service]      // optional
//!   manifest: |                     // raw [Service] body, or ...
//!     Type=oneshot
//!   execContainer:                  // ... a container to run
//!     image: busybox
//!     command: [sh, -c, "echo hi"]
//!     environment: {KEY: value}

use crate::spec::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stop and disable the named unit instead of installing anything.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_container: Option<ExecContainerAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecContainerAction {
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

/// What a well-formed hook asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HookAction<'a> {
    Disable,
    Manifest(&'a str),
    Container(&'a ExecContainerAction),
}

impl HookSpec {
    /// Classify the hook, or describe why it is malformed.
    pub fn action(&self) -> Result<HookAction<'_>, String> {
        if self.disabled {
            return Ok(HookAction::Disable);
        }
        match (&self.manifest, &self.exec_container) {
            (Some(manifest), None) => Ok(HookAction::Manifest(manifest)),
            (None, Some(exec)) => {
                if exec.image.trim().is_empty() {
                    return Err("execContainer has no image".to_string());
                }
                Ok(HookAction::Container(exec))
            }
            (Some(_), Some(_)) => {
                Err("both manifest and execContainer are set; pick one".to_string())
            }
            (None, None) => Err("neither manifest nor execContainer is set".to_string()),
        }
    }
}
