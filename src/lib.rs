//! Renders the first-boot script that installs hooks and starts nodeup on a
//! freshly launched instance.
//!
//! Flow: [`BootstrapScript::resource_node_up`] asks its [`ConfigBuilder`] for
//! the nodeup config, compiles the cluster and instance group hooks for the
//! group's role, renders the proxy environment, cuts the specs down to what
//! nodeup reads for that role, and composes a [`RenderedScript`]. Calling [`RenderedScript::render`] produces the text.

pub mod bootstrap;
pub mod error;
pub mod hooks;
pub mod proxy;
pub mod render;
pub mod spec;

pub use bootstrap::{BootstrapScript, ConfigBuilder, FileConfigBuilder, NodeAgentConfig};
pub use error::{RenderError, Result};
pub use render::RenderedScript;
