//! Error types for the monitoring pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtwatchError {
    /// A frame was constructed with fields that fail validation.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A sink write failed.
    #[error("sink write failed: {0}")]
    Sink(#[from] std::io::Error),

    /// A document could not be serialized for emission.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OtwatchError>;
