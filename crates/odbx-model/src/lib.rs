//! Version-neutral representation of a thermal result container.
//!
//! This crate provides:
//! - **Mesh** geometry per instance (nodes, elements, element-type tags)
//! - **Steps** and their frames (ordinal index, time, description)
//! - **Field buckets**: one NT11 value block per
//!   (step, frame, instance, position kind, section point)
//!
//! Every constructor enforces the invariants of the intermediate
//! representation, so a value that exists is a value that can be written.

mod error;
pub mod field;
pub mod mesh;
pub mod steps;

pub use error::{ModelError, Result};
pub use field::{BucketScope, FieldBucket, LabelKind, PositionKind, SectionPoint};
pub use mesh::{Element, ElementType, Instance, Label, Mesh, MeshStatistics, Node, label_from_i64};
pub use steps::{Frame, Step, Steps, TIME_DOMAIN};
