use thiserror::Error;

use crate::NodeId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Strict mode saw a key that was never initialised.
    #[error("unknown state key `{0}`; initialise it or build it with `build_key`")]
    UnknownKey(String),
    #[error("invalid component name `{0}`: expected a single alphabetic word")]
    InvalidComponentName(String),
    #[error("component `{0}` is already declared")]
    AlreadyDeclared(String),
    #[error("no component or element named `{0}`")]
    UnknownComponent(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("node {0:?} no longer exists")]
    StaleNode(NodeId),
    #[error("node {0:?} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("attaching node {0:?} here would make it its own ancestor")]
    WouldCycle(NodeId),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Raised by an extension crate (such as the router) inside a builder.
    #[error(transparent)]
    Extension(Box<dyn std::error::Error + Send + Sync>),
}
