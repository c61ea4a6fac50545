//! Interchange artifacts for moving NT11 results between container versions.
//!
//! This crate provides:
//! - **`mesh.json`**: instance name → nodes and elements (whole document)
//! - **`steps.json`**: steps with frame index, time and description (whole document)
//! - **`nt11.jsonl`**: one field bucket per line, written and read as a stream
//!
//! Every reader validates what it parses and reports a [`FormatError`]
//! carrying the artifact, line number and field of the first problem.

pub mod buckets;
mod error;
pub mod mesh_doc;
mod paths;
pub mod steps_doc;

pub use buckets::{
    BucketReader, BucketWriter, NumberedBuckets, decode_bucket, encode_bucket, write_buckets,
};
pub use error::{Artifact, FormatError, IoError, Result};
pub use mesh_doc::{read_mesh, read_mesh_from, write_mesh, write_mesh_to};
pub use paths::ArtifactPaths;
pub use steps_doc::{read_steps, read_steps_from, write_steps, write_steps_to};
