use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Artifact;

/// Locations of one artifact set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub mesh: PathBuf,
    pub steps: PathBuf,
    pub buckets: PathBuf,
}

impl ArtifactPaths {
    pub fn new(
        mesh: impl Into<PathBuf>,
        steps: impl Into<PathBuf>,
        buckets: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mesh: mesh.into(),
            steps: steps.into(),
            buckets: buckets.into(),
        }
    }

    /// Default file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(Artifact::Mesh.file_name()),
            dir.join(Artifact::Steps.file_name()),
            dir.join(Artifact::Buckets.file_name()),
        )
    }

    pub fn path(&self, artifact: Artifact) -> &Path {
        match artifact {
            Artifact::Mesh => &self.mesh,
            Artifact::Steps => &self.steps,
            Artifact::Buckets => &self.buckets,
        }
    }

    /// Create every parent directory the artifacts will be written into
    pub fn ensure_parent_dirs(&self) -> io::Result<()> {
        for path in [&self.mesh, &self.steps, &self.buckets] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
