//! Entry point: instance group + cluster spec in, deferred bootstrap script out.

use crate::error::{RenderError, Result};
use crate::hooks::compile_hooks;
use crate::proxy::render_proxy_env;
use crate::render::{AgentBootstrap, RenderedScript, compose};
use crate::spec::{
    ClusterSpec, ClusterSpecSubset, InstanceGroup, InstanceGroupSubset, load_document,
};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// nodeup configuration for one instance group.
///
/// This crate never looks inside it; it is only serialized into the script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAgentConfig(Value);

impl NodeAgentConfig {
    pub fn new<T: Serialize>(config: &T) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::to_value(config).map(Self)
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Set a top-level key. Returns false when the config is not a mapping.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if self.0.is_null() {
            self.0 = Value::Mapping(Mapping::new());
        }
        match &mut self.0 {
            Value::Mapping(map) => {
                map.insert(Value::String(key.to_string()), value.into());
                true
            }
            _ => false,
        }
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }
}

/// Builds the nodeup config for an instance group.
pub trait ConfigBuilder {
    fn build(&self, group: &InstanceGroup) -> anyhow::Result<NodeAgentConfig>;
}

impl<F> ConfigBuilder for F
where
    F: Fn(&InstanceGroup) -> anyhow::Result<NodeAgentConfig>,
{
    fn build(&self, group: &InstanceGroup) -> anyhow::Result<NodeAgentConfig> {
        self(group)
    }
}

/// Reads the nodeup config from a YAML or JSON document and stamps the
/// instance group's name and role into it.
///
/// The file is read on every build, and only for groups that run nodeup.
#[derive(Debug, Clone)]
pub struct FileConfigBuilder {
    path: PathBuf,
}

impl FileConfigBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigBuilder for FileConfigBuilder {
    fn build(&self, group: &InstanceGroup) -> anyhow::Result<NodeAgentConfig> {
        let value: Value = load_document(&self.path)?;
        let mut config = NodeAgentConfig::from_value(value);
        if !config.insert("InstanceGroupName", group.name.as_str())
            || !config.insert("InstanceGroupRole", group.role().as_str())
        {
            anyhow::bail!("{} is not a mapping", self.path.display());
        }
        debug!(path = %self.path.display(), group = %group.name, "loaded nodeup config");
        Ok(config)
    }
}

/// Renders nodeup bootstrap scripts for instance groups.
pub struct BootstrapScript<B> {
    pub nodeup_source: String,
    pub nodeup_source_hash: String,
    pub config_builder: B,
}

impl<B: ConfigBuilder> BootstrapScript<B> {
    pub fn new(
        nodeup_source: impl Into<String>,
        nodeup_source_hash: impl Into<String>,
        config_builder: B,
    ) -> Self {
        Self {
            nodeup_source: nodeup_source.into(),
            nodeup_source_hash: nodeup_source_hash.into(),
            config_builder,
        }
    }

    /// Assemble the bootstrap script for `group`.
    ///
    /// Returns `Ok(None)` for roles that do not run nodeup (bastions). The
    /// returned script is not rendered yet; call [`RenderedScript::render`].
    pub fn resource_node_up(
        &self,
        group: &InstanceGroup,
        cluster: &ClusterSpec,
    ) -> Result<Option<RenderedScript>> {
        let role = group.role();
        if !role.runs_nodeup() {
            warn!(group = %group.name, %role, "instance group gets no bootstrap script");
            return Ok(None);
        }

        let config = self
            .config_builder
            .build(group)
            .map_err(|source| RenderError::ConfigBuild {
                group: group.name.clone(),
                source,
            })?;
        let config = config.to_yaml().map_err(|e| RenderError::ConfigBuild {
            group: group.name.clone(),
            source: anyhow::Error::new(e).context("serializing nodeup config"),
        })?;

        let hooks = compile_hooks(&cluster.hooks, &group.spec.hooks, role)?;
        let proxy_env = render_proxy_env(cluster.egress_proxy.as_ref());
        let cluster_spec = ClusterSpecSubset::for_role(cluster, role).to_yaml()?;
        let ig_spec = InstanceGroupSubset::for_group(group).to_yaml()?;

        info!(group = %group.name, %role, hooks = hooks.len(), "assembled bootstrap script");

        Ok(Some(compose(
            proxy_env,
            hooks,
            AgentBootstrap {
                source_url: self.nodeup_source.clone(),
                source_hash: self.nodeup_source_hash.clone(),
                config,
                cluster_spec,
                ig_spec,
            },
        )))
    }
}
