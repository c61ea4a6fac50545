//! Error types for odbx-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Label must be a positive integer, got {0}")]
    NonPositiveLabel(i64),

    #[error("Duplicate node {label} in instance '{instance}'")]
    DuplicateNode { instance: String, label: u32 },

    #[error("Duplicate element {label} in instance '{instance}'")]
    DuplicateElement { instance: String, label: u32 },

    #[error("Duplicate instance name: {0}")]
    DuplicateInstance(String),

    #[error("Element {element} in instance '{instance}' references missing node {node}")]
    DanglingNode {
        instance: String,
        element: u32,
        node: u32,
    },

    #[error("Element {element} of type {element_type} has {actual} nodes but expected {expected}")]
    ConnectivityLength {
        element: u32,
        element_type: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown element type: {0}")]
    UnknownElementType(String),

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}': frame at position {position} has index {index}")]
    FrameIndex {
        step: String,
        position: usize,
        index: usize,
    },

    #[error("Unknown position kind: {0}")]
    UnknownPosition(String),

    #[error("Position {0} does not admit a section point")]
    SectionPointNotAdmitted(String),

    #[error("Bucket has {labels} labels but {values} values")]
    LengthMismatch { labels: usize, values: usize },

    #[error("Bucket has no values")]
    EmptyBucket,
}
