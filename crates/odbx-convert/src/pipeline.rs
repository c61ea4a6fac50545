//! Export, import and check drivers.

use std::collections::HashMap;
use std::path::Path;

use odbx_io::{
    Artifact, ArtifactPaths, BucketReader, BucketWriter, FormatError, read_mesh, read_steps,
    write_mesh, write_steps,
};
use odbx_model::{LabelKind, Mesh};
use odbx_native::{ArchiveHeader, CurrentArchive, SourceRepository, TargetBackend};

use crate::bucket_extractor::BucketExtractor;
use crate::config::{ExportConfig, ImportConfig};
use crate::error::Result;
use crate::field_writer::FieldWriter;
use crate::mesh_extractor::extract_mesh;
use crate::model_builder::ModelBuilder;
use crate::step_extractor::extract_steps;

/// What an export wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub instances: usize,
    pub nodes: usize,
    pub elements: usize,
    pub steps: usize,
    pub frames: usize,
    pub buckets: usize,
    pub values: usize,
}

impl ExportReport {
    pub fn format(&self) -> String {
        format!(
            "Exported {} instances ({} nodes, {} elements), {} steps ({} frames), {} buckets ({} values)",
            self.instances,
            self.nodes,
            self.elements,
            self.steps,
            self.frames,
            self.buckets,
            self.values
        )
    }
}

/// What an import wrote to the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub instances: usize,
    pub nodes: usize,
    pub elements: usize,
    pub steps: usize,
    pub frames: usize,
    pub field_outputs: usize,
    pub buckets: usize,
    pub values: usize,
}

impl ImportReport {
    pub fn format(&self) -> String {
        format!(
            "Imported {} instances ({} nodes, {} elements), {} steps ({} frames), {} field outputs, {} buckets ({} values)",
            self.instances,
            self.nodes,
            self.elements,
            self.steps,
            self.frames,
            self.field_outputs,
            self.buckets,
            self.values
        )
    }
}

/// What a check validated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub instances: usize,
    pub steps: usize,
    pub frames: usize,
    pub buckets: usize,
    pub values: usize,
}

impl CheckReport {
    pub fn format(&self) -> String {
        format!(
            "OK: {} instances, {} steps ({} frames), {} buckets ({} values)",
            self.instances, self.steps, self.frames, self.buckets, self.values
        )
    }
}

/// Extract mesh, steps and buckets from `source` into the artifacts at
/// `paths`. Existing artifacts are overwritten.
pub fn export<S: SourceRepository>(
    source: &S,
    paths: &ArtifactPaths,
    config: &ExportConfig,
) -> Result<ExportReport> {
    let mesh = extract_mesh(source)?;
    let steps = extract_steps(source, config.step_filter.as_deref())?;

    paths.ensure_parent_dirs()?;
    write_mesh(&paths.mesh, &mesh)?;
    write_steps(&paths.steps, &steps)?;

    let mut writer = BucketWriter::create(&paths.buckets)?;
    let mut values = 0;
    for bucket in BucketExtractor::new(source, &steps, config.field_name.as_str()) {
        let bucket = bucket?;
        values += bucket.len();
        writer.write(&bucket)?;
    }
    let buckets = writer.finish()?;

    let stats = mesh.statistics();
    let report = ExportReport {
        instances: stats.num_instances,
        nodes: stats.num_nodes,
        elements: stats.num_elements,
        steps: steps.len(),
        frames: steps.total_frames(),
        buckets,
        values,
    };
    tracing::info!(
        buckets = report.buckets,
        values = report.values,
        dir = %paths.buckets.parent().unwrap_or(Path::new(".")).display(),
        "export complete"
    );
    Ok(report)
}

/// Rebuild a target from the artifacts at `paths`.
///
/// Geometry is created and committed first; buckets are then streamed
/// from disk and attached one at a time.
pub fn import<B: TargetBackend>(
    backend: &B,
    paths: &ArtifactPaths,
    config: &ImportConfig,
) -> Result<ImportReport> {
    let mesh = read_mesh(&paths.mesh)?;
    let steps = read_steps(&paths.steps)?;
    let reader = BucketReader::open(&paths.buckets)?;
    tracing::info!(
        instances = mesh.instances().len(),
        steps = steps.len(),
        "artifacts loaded"
    );

    let (model, geometry) = ModelBuilder::new(backend, config).build(&mesh)?;
    let written = FieldWriter::new(model, &steps, config)?.write_all(reader.numbered())?;

    let report = ImportReport {
        instances: geometry.instances,
        nodes: geometry.nodes,
        elements: geometry.elements,
        steps: written.steps,
        frames: written.frames,
        field_outputs: written.field_outputs,
        buckets: written.buckets,
        values: written.values,
    };
    tracing::info!(buckets = report.buckets, values = report.values, "import complete");
    Ok(report)
}

/// Target container at `path` with the header from `config`
pub fn target_archive(path: impl AsRef<Path>, config: &ImportConfig) -> CurrentArchive {
    let header = ArchiveHeader::new(config.model_name.as_str())
        .with_title(config.analysis_title.as_str())
        .with_description(config.description.as_str());
    CurrentArchive::new(path.as_ref(), header)
}

/// Validate an artifact set without touching a target.
///
/// Every bucket must resolve against the Steps, name an instance of the
/// Mesh and carry only labels that instance defines.
pub fn check(paths: &ArtifactPaths) -> Result<CheckReport> {
    let mesh = read_mesh(&paths.mesh)?;
    let steps = read_steps(&paths.steps)?;
    let labels = LabelIndex::new(&mesh);

    let mut report = CheckReport {
        instances: mesh.instances().len(),
        steps: steps.len(),
        frames: steps.total_frames(),
        ..CheckReport::default()
    };
    let mut reader = BucketReader::open(&paths.buckets)?.resolve_against(&steps);
    while let Some(bucket) = reader.next() {
        let bucket = bucket?;
        labels.check(&bucket, reader.line())?;
        report.buckets += 1;
        report.values += bucket.len();
    }
    tracing::info!(buckets = report.buckets, "artifacts check out");
    Ok(report)
}

struct LabelIndex<'m> {
    instances: HashMap<&'m str, &'m odbx_model::Instance>,
}

impl<'m> LabelIndex<'m> {
    fn new(mesh: &'m Mesh) -> Self {
        Self {
            instances: mesh.instances().iter().map(|i| (i.name(), i)).collect(),
        }
    }

    fn check(
        &self,
        bucket: &odbx_model::FieldBucket,
        line: usize,
    ) -> std::result::Result<(), FormatError> {
        let error = |field: &str, message: String| {
            FormatError::new(Artifact::Buckets, message)
                .at_line(line)
                .in_field(field)
        };
        let instance = self.instances.get(bucket.instance()).ok_or_else(|| {
            error(
                "instance",
                format!("instance '{}' is not in the mesh", bucket.instance()),
            )
        })?;
        let kind = bucket.position().label_kind();
        let missing = bucket.labels().iter().find(|&&label| match kind {
            LabelKind::Node => !instance.contains_node(label),
            LabelKind::Element => !instance.contains_element(label),
        });
        if let Some(label) = missing {
            return Err(error(
                "labels",
                format!(
                    "{kind:?} {label} is not defined in instance '{}'",
                    bucket.instance()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_format() {
        let report = CheckReport {
            instances: 1,
            steps: 1,
            frames: 2,
            buckets: 3,
            values: 4,
        };
        assert_eq!(
            report.format(),
            "OK: 1 instances, 1 steps (2 frames), 3 buckets (4 values)"
        );
    }
}
