//! Run-level error taxonomy.
//!
//! Every variant is fatal to the run. Messages carry the step, frame,
//! instance and line number needed to locate the offending data.

use odbx_io::{FormatError, IoError};
use odbx_model::Label;
use odbx_native::NativeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Inconsistency found while reading the source container
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Instance '{instance}': element {element} references missing node {node}")]
    DanglingNode {
        instance: String,
        element: i64,
        node: i64,
    },

    #[error("Instance '{instance}': {message}")]
    InvalidGeometry { instance: String, message: String },

    #[error("Step '{step}': {message}")]
    InvalidStep { step: String, message: String },

    #[error("Step '{step}' frame {frame}: unsupported position '{position}'")]
    UnknownPosition {
        step: String,
        frame: usize,
        position: String,
    },

    #[error("Step '{step}' frame {frame}, instance '{instance}': non-finite value {value} at label {label}")]
    NonFiniteValue {
        step: String,
        frame: usize,
        instance: String,
        label: Label,
        value: f64,
    },

    #[error("Step '{step}' frame {frame}: {message}")]
    InvalidFieldValue {
        step: String,
        frame: usize,
        message: String,
    },
}

/// Inconsistency between the bucket stream and the target geometry or steps.
///
/// `line` is the bucket's 1-based line in `nt11.jsonl`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructionError {
    #[error("nt11.jsonl line {line}: unknown step '{step}' (frame {frame_index}, instance '{instance}')")]
    UnknownStep {
        line: usize,
        step: String,
        frame_index: usize,
        instance: String,
    },

    #[error("nt11.jsonl line {line}: step '{step}' declares {frames} frames, no frame {frame_index} (instance '{instance}')")]
    UnknownFrame {
        line: usize,
        step: String,
        frame_index: usize,
        instance: String,
        frames: usize,
    },

    #[error("nt11.jsonl line {line}: unknown instance '{instance}' (step '{step}' frame {frame_index})")]
    UnknownInstance {
        line: usize,
        step: String,
        frame_index: usize,
        instance: String,
    },

    #[error("nt11.jsonl line {line}: {kind} {label} not found in instance '{instance}' (step '{step}' frame {frame_index})")]
    UnknownLabel {
        line: usize,
        step: String,
        frame_index: usize,
        instance: String,
        kind: &'static str,
        label: Label,
    },
}

impl ReconstructionError {
    /// Line of the offending bucket
    pub fn line(&self) -> usize {
        match self {
            Self::UnknownStep { line, .. }
            | Self::UnknownFrame { line, .. }
            | Self::UnknownInstance { line, .. }
            | Self::UnknownLabel { line, .. } => *line,
        }
    }
}

/// A native-runtime operation failed
#[derive(Error, Debug)]
#[error("{operation} failed: {source}")]
pub struct RuntimeError {
    pub operation: String,
    #[source]
    pub source: NativeError,
}

impl RuntimeError {
    pub fn new(operation: impl Into<String>, source: NativeError) -> Self {
        Self {
            operation: operation.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Reconstruction error: {0}")]
    Reconstruction(#[from] ReconstructionError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io(e) => Error::Io(e),
            IoError::Format(e) => Error::Format(e),
        }
    }
}

/// Attach the failing operation to a native result
pub(crate) trait NativeResultExt<T> {
    fn during(self, operation: impl Into<String>) -> std::result::Result<T, RuntimeError>;
}

impl<T> NativeResultExt<T> for odbx_native::Result<T> {
    fn during(self, operation: impl Into<String>) -> std::result::Result<T, RuntimeError> {
        self.map_err(|source| RuntimeError::new(operation, source))
    }
}
