//! Script composition: the nodeup bootstrap template and its deferred render.

pub mod script;

pub use script::{AgentBootstrap, RenderedScript, compose};
