//! Error types for the synchronizer.

use thiserror::Error;

/// Main error type for synchronizer operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Patch operation {index} failed: {source}")]
    PatchApply {
        index: usize,
        #[source]
        source: PatchError,
    },

    #[error("Topic not registered: {0}")]
    TopicNotRegistered(String),

    #[error("Topic already registered: {0}")]
    TopicExists(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decode(e.to_string())
    }
}

/// Failures of the push channel itself.
///
/// Cloneable so a single failure can be handed to every subscriber of a topic.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to open {url}: {reason}")]
    OpenFailed { url: String, reason: String },

    #[error("connection to {url} dropped")]
    Disconnected { url: String },

    #[error("stream error on {url}: {message}")]
    Stream { url: String, message: String },
}

/// Failures while applying a single JSON Patch operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// `path` does not resolve, or resolves to an invalid array index.
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// `from` of a `move` or `copy` does not resolve.
    #[error("invalid from path {0:?}")]
    InvalidFrom(String),

    #[error("test failed at {0:?}")]
    TestFailed(String),

    #[error("cannot move {from:?} into its own child {path:?}")]
    MoveIntoChild { from: String, path: String },

    #[error("malformed operation: {0}")]
    Malformed(String),

    #[error("{0}")]
    Rejected(String),
}

/// Result type for synchronizer operations.
pub type Result<T> = std::result::Result<T, SyncError>;
