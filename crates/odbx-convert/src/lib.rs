//! NT11 migration between result container versions.
//!
//! Export runs three extractors over a [`SourceRepository`] and streams the
//! result into the interchange artifacts. Import rebuilds the geometry in a
//! [`TargetBackend`], commits and reopens it, then attaches the buckets.
//!
//! # Example
//!
//! ```no_run
//! use odbx_convert::{ExportConfig, ImportConfig, export, import, target_archive};
//! use odbx_io::ArtifactPaths;
//! use odbx_native::LegacyArchive;
//!
//! # fn main() -> odbx_convert::Result<()> {
//! let source = LegacyArchive::open("model.json")
//!     .map_err(|e| odbx_convert::RuntimeError::new("open source", e))?;
//! let paths = ArtifactPaths::in_dir("export");
//! export(&source, &paths, &ExportConfig::default())?;
//!
//! let config = ImportConfig::default();
//! let report = import(&target_archive("derived.json", &config), &paths, &config)?;
//! println!("{}", report.format());
//! # Ok(())
//! # }
//! ```
//!
//! [`SourceRepository`]: odbx_native::SourceRepository
//! [`TargetBackend`]: odbx_native::TargetBackend

pub mod bucket_extractor;
pub mod config;
mod error;
pub mod field_writer;
pub mod mesh_extractor;
pub mod model_builder;
pub mod pipeline;
pub mod step_extractor;

pub use bucket_extractor::BucketExtractor;
pub use config::{ExportConfig, ImportConfig, NT11};
pub use error::{Error, ExtractionError, ReconstructionError, Result, RuntimeError};
pub use field_writer::{FieldWriter, WriteSummary};
pub use mesh_extractor::extract_mesh;
pub use model_builder::{BuildState, GeometrySummary, ModelBuilder, ModelHandle};
pub use pipeline::{CheckReport, ExportReport, ImportReport, check, export, import, target_archive};
pub use step_extractor::extract_steps;
