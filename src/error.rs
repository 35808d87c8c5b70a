//! Error types for script rendering.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The injected config builder failed for this instance group.
    #[error("building nodeup config for instance group {group:?}: {source}")]
    ConfigBuild {
        group: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed hook {hook}: {reason}")]
    MalformedHook { hook: String, reason: String },

    #[error("duplicate hook name {name:?}")]
    DuplicateHook { name: String },

    #[error("template error: {0}")]
    Template(String),

    /// A spec subset could not be serialized for embedding.
    #[error("serializing {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
