//! Native result containers behind repository traits.
//!
//! Two file-backed adapters stand in for the two runtime generations:
//! - [`LegacyArchive`]: version 1, read through [`SourceRepository`]
//! - [`CurrentArchive`]: version 2, written through [`TargetBackend`] and
//!   [`TargetRepository`] with a commit-then-reopen lifecycle

pub mod current;
mod error;
pub mod legacy;
pub mod repository;

pub use current::{ArchiveDocument, ArchiveHeader, ArchiveSession, ArchiveSummary, CurrentArchive};
pub use error::{NativeError, Result};
pub use legacy::{LegacyArchive, LegacyDocument};
pub use repository::{
    FieldBlock, NativeElement, NativeFieldValue, NativeFrame, NativeNode, NativeSectionPoint,
    NativeStep, SectionPointRef, SourceRepository, TargetBackend, TargetRepository, native_label,
};
