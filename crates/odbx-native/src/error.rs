//! Error types for odbx-native

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NativeError>;

/// Failures reported by a native result container
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Container not found: {0}")]
    NotFound(PathBuf),

    #[error("Container already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Unsupported container version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("Corrupt container: {0}")]
    Corrupt(String),

    #[error("Geometry has not been committed; save, close and reopen before writing results")]
    GeometryNotCommitted,

    #[error("Geometry is frozen once the container is reopened")]
    GeometryFrozen,

    #[error("Part not found: {0}")]
    UnknownPart(String),

    #[error("Instance not found: {0}")]
    UnknownInstance(String),

    #[error("Step not found: {0}")]
    UnknownStep(String),

    #[error("Frame {increment} not found in step '{step}'")]
    UnknownFrame { step: String, increment: usize },

    #[error("Field output '{field}' not found in step '{step}' frame {increment}")]
    UnknownField {
        step: String,
        increment: usize,
        field: String,
    },

    #[error("Section category not found: {0}")]
    UnknownSectionCategory(String),

    #[error("{kind} {label} not found in instance '{instance}'")]
    UnknownLabel {
        instance: String,
        kind: &'static str,
        label: u32,
    },

    #[error("Already defined: {0}")]
    Duplicate(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NativeError {
    fn from(err: serde_json::Error) -> Self {
        NativeError::Corrupt(err.to_string())
    }
}
