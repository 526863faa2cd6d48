//! Error types shared across the crate.

use thiserror::Error;

use crate::dom::NodeId;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by tree mutations, async scheduling and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The reference node passed to an insertion or removal is not a child
    /// of the node being mutated.
    #[error("node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// Inserting the node would make it its own ancestor.
    #[error("cannot insert node {child} into node {parent}: it would become its own ancestor")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    /// Async work was started outside of a Tokio runtime.
    #[error("no async runtime is available to drive pending work")]
    NoRuntime,

    /// An async resource fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A lazily loaded component failed to load.
    #[error("component load failed: {0}")]
    Load(String),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_readable_messages() {
        assert_eq!(
            Error::Fetch("timeout".into()).to_string(),
            "fetch failed: timeout"
        );
        assert_eq!(
            Error::NoRuntime.to_string(),
            "no async runtime is available to drive pending work"
        );
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
