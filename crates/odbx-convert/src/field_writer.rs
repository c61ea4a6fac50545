//! Steps, frames and NT11 field data in the target.
//!
//! Every step and frame is created first, in Steps order and ascending
//! frame index, independent of the order buckets arrive in. Buckets are
//! then attached one at a time; each is checked against the Steps and the
//! committed geometry before anything is written for it.

use std::collections::{HashMap, HashSet};

use odbx_model::{FieldBucket, Label, LabelKind, SectionPoint, Steps};
use odbx_native::{
    FieldBlock, NativeError, NativeFrame, NativeStep, SectionPointRef, TargetRepository,
};

use crate::config::ImportConfig;
use crate::error::{Error, NativeResultExt, ReconstructionError, Result, RuntimeError};
use crate::model_builder::{BuildState, ModelHandle};

/// Relative tolerance when comparing a bucket's frame value to the
/// declared frame time
const FRAME_TIME_TOLERANCE: f64 = 1e-9;

/// Counts of results written to the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub steps: usize,
    pub frames: usize,
    pub field_outputs: usize,
    pub buckets: usize,
    pub values: usize,
}

struct CommittedLabels {
    nodes: HashSet<Label>,
    elements: HashSet<Label>,
}

/// Attaches field buckets to a committed and reopened target
pub struct FieldWriter<'a, H: TargetRepository> {
    model: ModelHandle<H>,
    steps: &'a Steps,
    config: &'a ImportConfig,
    geometry: HashMap<String, CommittedLabels>,
    field_outputs: HashSet<(String, usize)>,
    section_points: HashMap<SectionPoint, SectionPointRef>,
    summary: WriteSummary,
}

impl<'a, H: TargetRepository> FieldWriter<'a, H> {
    /// Take ownership of `model`. Refuses unless the geometry has been
    /// committed and the handle reopened.
    pub fn new(
        model: ModelHandle<H>,
        steps: &'a Steps,
        config: &'a ImportConfig,
    ) -> std::result::Result<Self, RuntimeError> {
        if model.state() != BuildState::CommittedAndReopened {
            tracing::error!(state = ?model.state(), "field writer refused: geometry not committed");
            return Err(RuntimeError::new(
                "write field data",
                NativeError::GeometryNotCommitted,
            ));
        }
        let repo = model.repository();
        let mut geometry = HashMap::new();
        for instance in repo.instance_names() {
            let labels = CommittedLabels {
                nodes: repo
                    .node_labels(&instance)
                    .during(format!("read node labels of '{instance}'"))?
                    .into_iter()
                    .collect(),
                elements: repo
                    .element_labels(&instance)
                    .during(format!("read element labels of '{instance}'"))?
                    .into_iter()
                    .collect(),
            };
            geometry.insert(instance, labels);
        }
        Ok(Self {
            model,
            steps,
            config,
            geometry,
            field_outputs: HashSet::new(),
            section_points: HashMap::new(),
            summary: WriteSummary::default(),
        })
    }

    /// Create every step and frame, in order
    pub fn create_frames(&mut self) -> std::result::Result<(), RuntimeError> {
        let repo = self.model.repository_mut();
        for step in self.steps {
            let native = NativeStep {
                name: step.name().to_string(),
                description: step.description().to_string(),
                domain: step.domain().to_string(),
            };
            repo.create_step(&native, step.time_period())
                .during(format!("create step '{}'", step.name()))?;
            for frame in step.frames() {
                let native = NativeFrame {
                    increment_number: frame.index,
                    frame_value: frame.time,
                    description: frame.description.clone(),
                };
                repo.create_frame(step.name(), &native)
                    .during(format!("create frame {} of step '{}'", frame.index, step.name()))?;
            }
            self.summary.steps += 1;
            self.summary.frames += step.frames().len();
        }
        tracing::info!(
            steps = self.summary.steps,
            frames = self.summary.frames,
            "frames created"
        );
        Ok(())
    }

    /// Check `bucket` against the Steps and committed geometry.
    /// `line` is the bucket's 1-based line in the stream.
    pub fn validate(
        &self,
        line: usize,
        bucket: &FieldBucket,
    ) -> std::result::Result<(), ReconstructionError> {
        let step = self
            .steps
            .get(bucket.step())
            .ok_or_else(|| ReconstructionError::UnknownStep {
                line,
                step: bucket.step().to_string(),
                frame_index: bucket.frame_index(),
                instance: bucket.instance().to_string(),
            })?;
        let frame = step
            .frame(bucket.frame_index())
            .ok_or_else(|| ReconstructionError::UnknownFrame {
                line,
                step: step.name().to_string(),
                frame_index: bucket.frame_index(),
                instance: bucket.instance().to_string(),
                frames: step.frames().len(),
            })?;
        let scale = frame.time.abs().max(1.0);
        if (frame.time - bucket.frame_value()).abs() > FRAME_TIME_TOLERANCE * scale {
            tracing::warn!(
                line,
                step = step.name(),
                frame = frame.index,
                declared = frame.time,
                bucket = bucket.frame_value(),
                "bucket frame value differs from declared frame time"
            );
        }

        let geometry = self.geometry.get(bucket.instance()).ok_or_else(|| {
            ReconstructionError::UnknownInstance {
                line,
                step: step.name().to_string(),
                frame_index: frame.index,
                instance: bucket.instance().to_string(),
            }
        })?;
        let (kind, known) = match bucket.position().label_kind() {
            LabelKind::Node => ("Node", &geometry.nodes),
            LabelKind::Element => ("Element", &geometry.elements),
        };
        if let Some(&label) = bucket.labels().iter().find(|l| !known.contains(*l)) {
            return Err(ReconstructionError::UnknownLabel {
                line,
                step: step.name().to_string(),
                frame_index: frame.index,
                instance: bucket.instance().to_string(),
                kind,
                label,
            });
        }
        Ok(())
    }

    /// Validate and attach one bucket
    pub fn write_bucket(&mut self, line: usize, bucket: &FieldBucket) -> Result<()> {
        self.validate(line, bucket)?;
        let step = bucket.step();
        let frame = bucket.frame_index();
        let config = self.config;
        let field = config.field_name.as_str();

        let key = (step.to_string(), frame);
        if !self.field_outputs.contains(&key) {
            self.model
                .repository_mut()
                .create_field_output(step, frame, field, &config.field_description)
                .during(format!("create {field} in step '{step}' frame {frame}"))?;
            self.field_outputs.insert(key);
            self.summary.field_outputs += 1;
        }

        let section_point = match bucket.section_point() {
            Some(sp) => Some(self.section_point(sp)?),
            None => None,
        };
        let block = FieldBlock {
            instance: bucket.instance(),
            position: bucket.position(),
            section_point: section_point.as_ref(),
            labels: bucket.labels(),
            data: bucket.values(),
        };
        self.model
            .repository_mut()
            .add_field_data(step, frame, field, block)
            .during(format!(
                "add {field} data for '{}' in step '{step}' frame {frame}",
                bucket.instance()
            ))?;

        self.summary.buckets += 1;
        self.summary.values += bucket.len();
        tracing::debug!(
            line,
            step,
            frame,
            instance = bucket.instance(),
            position = %bucket.position(),
            values = bucket.len(),
            "bucket written"
        );
        Ok(())
    }

    /// Pooled section point; the category is created with the first one
    fn section_point(
        &mut self,
        sp: &SectionPoint,
    ) -> std::result::Result<SectionPointRef, RuntimeError> {
        if let Some(existing) = self.section_points.get(sp) {
            return Ok(existing.clone());
        }
        let config = self.config;
        let category = config.section_category.as_str();
        let repo = self.model.repository_mut();
        if self.section_points.is_empty() {
            repo.create_section_category(category, category)
                .during(format!("create section category '{category}'"))?;
        }
        let created = repo
            .create_section_point(category, sp.number, &sp.description)
            .during(format!("create section point {}", sp.number))?;
        self.section_points.insert(sp.clone(), created.clone());
        Ok(created)
    }

    /// Create frames, attach every `(line, bucket)` of `buckets`, then save.
    ///
    /// The stream is consumed in one pass. On the first error the target
    /// is released unsaved.
    pub fn write_all<I, E>(mut self, buckets: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = std::result::Result<(usize, FieldBucket), E>>,
        Error: From<E>,
    {
        self.create_frames()?;
        for item in buckets {
            let (line, bucket) = item.map_err(Error::from)?;
            self.write_bucket(line, &bucket)?;
        }
        self.model.repository_mut().save().during("save results")?;
        let summary = self.summary.clone();
        self.model.close()?;
        tracing::info!(
            buckets = summary.buckets,
            values = summary.values,
            field_outputs = summary.field_outputs,
            "field data written"
        );
        Ok(summary)
    }
}
