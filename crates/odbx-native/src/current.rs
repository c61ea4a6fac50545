//! Current (version 2) result container.
//!
//! The container enforces a two-phase lifecycle. A handle from
//! [`CurrentArchive::create`] accepts geometry only; once it is saved the
//! geometry is committed, and results can be written through a handle
//! from [`CurrentArchive::open`], which in turn refuses further geometry.
//! Nothing reaches disk until [`TargetRepository::save`]; a handle that
//! is dropped or closed unsaved leaves the stored container untouched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use odbx_model::{Label, LabelKind, PositionKind, SectionPoint};
use serde::{Deserialize, Serialize};

use crate::error::{NativeError, Result};
use crate::legacy::ARCHIVE_FORMAT;
use crate::repository::{
    FieldBlock, NativeElement, NativeFrame, NativeNode, NativeStep, SectionPointRef, TargetBackend,
    TargetRepository, native_label,
};

pub const CURRENT_VERSION: u32 = 2;

/// Scalar field outputs are the only type this container writes
pub const SCALAR: &str = "SCALAR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveHeader {
    pub name: String,
    #[serde(default)]
    pub analysis_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl ArchiveHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analysis_title: String::new(),
            description: String::new(),
            created: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.analysis_title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveDocument {
    pub format: String,
    pub version: u32,
    pub header: ArchiveHeader,
    #[serde(default)]
    pub geometry_committed: bool,
    #[serde(default)]
    pub parts: Vec<ArchivePart>,
    #[serde(default)]
    pub root_assembly: ArchiveAssembly,
    #[serde(default)]
    pub section_categories: Vec<SectionCategory>,
    #[serde(default)]
    pub steps: Vec<ArchiveStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePart {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NativeNode>,
    #[serde(default)]
    pub element_blocks: Vec<ElementBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBlock {
    #[serde(rename = "type")]
    pub type_name: String,
    pub elements: Vec<NativeElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveAssembly {
    #[serde(default)]
    pub instances: Vec<ArchiveInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInstance {
    pub name: String,
    pub part: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub section_points: Vec<CategoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPoint {
    pub number: i32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStep {
    #[serde(flatten)]
    pub step: NativeStep,
    pub time_period: f64,
    #[serde(default)]
    pub frames: Vec<ArchiveFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFrame {
    #[serde(flatten)]
    pub frame: NativeFrame,
    #[serde(default)]
    pub field_outputs: Vec<ArchiveFieldOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveFieldOutput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub blocks: Vec<ArchiveBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveBlock {
    pub instance: String,
    pub position: String,
    #[serde(default)]
    pub section_point: Option<SectionPointRef>,
    pub labels: Vec<Label>,
    pub data: Vec<[f64; 1]>,
}

/// Counts reported by `inspect`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveSummary {
    pub parts: usize,
    pub instances: usize,
    pub nodes: usize,
    pub elements: usize,
    pub steps: usize,
    pub frames: usize,
    pub field_outputs: usize,
    pub values: usize,
}

impl ArchiveSummary {
    pub fn format(&self) -> String {
        format!(
            "Parts: {}\nInstances: {}\nNodes: {}\nElements: {}\nSteps: {}\nFrames: {}\nField outputs: {}\nValues: {}",
            self.parts,
            self.instances,
            self.nodes,
            self.elements,
            self.steps,
            self.frames,
            self.field_outputs,
            self.values
        )
    }
}

impl ArchiveDocument {
    fn empty(header: ArchiveHeader) -> Self {
        Self {
            format: ARCHIVE_FORMAT.to_string(),
            version: CURRENT_VERSION,
            header,
            geometry_committed: false,
            parts: Vec::new(),
            root_assembly: ArchiveAssembly::default(),
            section_categories: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Read and version-check a stored container
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NativeError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let document: ArchiveDocument = serde_json::from_slice(&bytes)?;
        if document.format != ARCHIVE_FORMAT {
            return Err(NativeError::Corrupt(format!(
                "unexpected format tag '{}'",
                document.format
            )));
        }
        if document.version != CURRENT_VERSION {
            return Err(NativeError::UnsupportedVersion {
                expected: CURRENT_VERSION,
                found: document.version,
            });
        }
        Ok(document)
    }

    pub fn part(&self, name: &str) -> Option<&ArchivePart> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn instance(&self, name: &str) -> Option<&ArchiveInstance> {
        self.root_assembly.instances.iter().find(|i| i.name == name)
    }

    pub fn step(&self, name: &str) -> Option<&ArchiveStep> {
        self.steps.iter().find(|s| s.step.name == name)
    }

    pub fn field_output(&self, step: &str, increment: usize, field: &str)
    -> Option<&ArchiveFieldOutput> {
        self.step(step)?
            .frames
            .get(increment)?
            .field_outputs
            .iter()
            .find(|f| f.name == field)
    }

    /// Look up the stored value for one label
    #[allow(clippy::too_many_arguments)]
    pub fn field_value(
        &self,
        step: &str,
        increment: usize,
        field: &str,
        instance: &str,
        position: PositionKind,
        label: Label,
        section_point: Option<&SectionPoint>,
    ) -> Option<f64> {
        let output = self.field_output(step, increment, field)?;
        output
            .blocks
            .iter()
            .filter(|b| b.instance == instance && b.position == position.as_str())
            .filter(|b| match (&b.section_point, section_point) {
                (None, None) => true,
                (Some(stored), Some(wanted)) => {
                    stored.number == wanted.number && stored.description == wanted.description
                }
                _ => false,
            })
            .find_map(|b| {
                b.labels
                    .iter()
                    .position(|&l| l == label)
                    .map(|i| b.data[i][0])
            })
    }

    pub fn summary(&self) -> ArchiveSummary {
        let mut summary = ArchiveSummary {
            parts: self.parts.len(),
            instances: self.root_assembly.instances.len(),
            steps: self.steps.len(),
            ..ArchiveSummary::default()
        };
        for part in &self.parts {
            summary.nodes += part.nodes.len();
            summary.elements += part
                .element_blocks
                .iter()
                .map(|b| b.elements.len())
                .sum::<usize>();
        }
        for step in &self.steps {
            summary.frames += step.frames.len();
            for frame in &step.frames {
                summary.field_outputs += frame.field_outputs.len();
                summary.values += frame
                    .field_outputs
                    .iter()
                    .flat_map(|f| &f.blocks)
                    .map(|b| b.labels.len())
                    .sum::<usize>();
            }
        }
        summary
    }

    fn instance_part(&self, instance: &str) -> Result<&ArchivePart> {
        let inst = self
            .instance(instance)
            .ok_or_else(|| NativeError::UnknownInstance(instance.to_string()))?;
        self.part(&inst.part)
            .ok_or_else(|| NativeError::UnknownPart(inst.part.clone()))
    }

    fn step_mut(&mut self, name: &str) -> Result<&mut ArchiveStep> {
        self.steps
            .iter_mut()
            .find(|s| s.step.name == name)
            .ok_or_else(|| NativeError::UnknownStep(name.to_string()))
    }

    fn frame_mut(&mut self, step: &str, increment: usize) -> Result<&mut ArchiveFrame> {
        self.step_mut(step)?
            .frames
            .get_mut(increment)
            .ok_or_else(|| NativeError::UnknownFrame {
                step: step.to_string(),
                increment,
            })
    }
}

impl ArchivePart {
    fn node_labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.nodes.iter().map(|n| n.label)
    }

    fn element_labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.element_blocks
            .iter()
            .flat_map(|b| &b.elements)
            .map(|e| e.label)
    }
}

/// File-backed target container
#[derive(Debug, Clone)]
pub struct CurrentArchive {
    path: PathBuf,
    header: ArchiveHeader,
}

impl CurrentArchive {
    pub fn new(path: impl Into<PathBuf>, header: ArchiveHeader) -> Self {
        Self {
            path: path.into(),
            header,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TargetBackend for CurrentArchive {
    type Handle = ArchiveSession;

    fn create(&self) -> Result<ArchiveSession> {
        if self.path.exists() {
            return Err(NativeError::AlreadyExists(self.path.clone()));
        }
        let mut header = self.header.clone();
        header.created.get_or_insert_with(Utc::now);
        tracing::debug!(path = %self.path.display(), name = %header.name, "creating archive");
        Ok(ArchiveSession {
            path: self.path.clone(),
            mode: SessionMode::Fresh,
            document: ArchiveDocument::empty(header),
            dirty: true,
        })
    }

    fn open(&self) -> Result<ArchiveSession> {
        let document = ArchiveDocument::load(&self.path)?;
        if !document.geometry_committed {
            return Err(NativeError::GeometryNotCommitted);
        }
        tracing::debug!(path = %self.path.display(), "reopened archive");
        Ok(ArchiveSession {
            path: self.path.clone(),
            mode: SessionMode::Reopened,
            document,
            dirty: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    /// Created in this session; geometry may be added
    Fresh,
    /// Opened after commit; only results may be added
    Reopened,
}

/// Writable handle to a [`CurrentArchive`]
#[derive(Debug)]
pub struct ArchiveSession {
    path: PathBuf,
    mode: SessionMode,
    document: ArchiveDocument,
    dirty: bool,
}

impl ArchiveSession {
    pub fn document(&self) -> &ArchiveDocument {
        &self.document
    }

    fn geometry_phase(&self) -> Result<()> {
        match self.mode {
            SessionMode::Fresh => Ok(()),
            SessionMode::Reopened => Err(NativeError::GeometryFrozen),
        }
    }

    fn results_phase(&self) -> Result<()> {
        match self.mode {
            SessionMode::Reopened => Ok(()),
            SessionMode::Fresh => Err(NativeError::GeometryNotCommitted),
        }
    }

    fn part_mut(&mut self, name: &str) -> Result<&mut ArchivePart> {
        self.document
            .parts
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| NativeError::UnknownPart(name.to_string()))
    }

    fn write_atomic(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let tmp = self.path.with_file_name(format!(".{file_name}.tmp"));
        let json = serde_json::to_vec_pretty(&self.document)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TargetRepository for ArchiveSession {
    fn create_part(&mut self, name: &str) -> Result<()> {
        self.geometry_phase()?;
        if self.document.part(name).is_some() {
            return Err(NativeError::Duplicate(format!("part '{name}'")));
        }
        self.document.parts.push(ArchivePart {
            name: name.to_string(),
            nodes: Vec::new(),
            element_blocks: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    fn add_nodes(&mut self, part: &str, nodes: &[NativeNode]) -> Result<()> {
        self.geometry_phase()?;
        let target = self.part_mut(part)?;
        let mut seen: HashSet<i64> = target.node_labels().collect();
        for node in nodes {
            native_label(node.label)?;
            if !(2..=3).contains(&node.coordinates.len()) {
                return Err(NativeError::InvalidData(format!(
                    "node {} has {} coordinates",
                    node.label,
                    node.coordinates.len()
                )));
            }
            if !seen.insert(node.label) {
                return Err(NativeError::Duplicate(format!(
                    "node {} in part '{part}'",
                    node.label
                )));
            }
        }
        target.nodes.extend_from_slice(nodes);
        self.dirty = true;
        Ok(())
    }

    fn add_elements(&mut self, part: &str, type_name: &str, elements: &[NativeElement])
    -> Result<()> {
        self.geometry_phase()?;
        let target = self.part_mut(part)?;
        let nodes: HashSet<i64> = target.node_labels().collect();
        let mut seen: HashSet<i64> = target.element_labels().collect();
        for element in elements {
            native_label(element.label)?;
            if element.type_name != type_name {
                return Err(NativeError::InvalidData(format!(
                    "element {} has type {} in a {type_name} block",
                    element.label, element.type_name
                )));
            }
            if let Some(missing) = element.connectivity.iter().find(|n| !nodes.contains(*n)) {
                return Err(NativeError::InvalidData(format!(
                    "element {} references missing node {missing}",
                    element.label
                )));
            }
            if !seen.insert(element.label) {
                return Err(NativeError::Duplicate(format!(
                    "element {} in part '{part}'",
                    element.label
                )));
            }
        }
        match target
            .element_blocks
            .iter_mut()
            .find(|b| b.type_name == type_name)
        {
            Some(block) => block.elements.extend_from_slice(elements),
            None => target.element_blocks.push(ElementBlock {
                type_name: type_name.to_string(),
                elements: elements.to_vec(),
            }),
        }
        self.dirty = true;
        Ok(())
    }

    fn create_instance(&mut self, name: &str, part: &str) -> Result<()> {
        self.geometry_phase()?;
        if self.document.part(part).is_none() {
            return Err(NativeError::UnknownPart(part.to_string()));
        }
        if self.document.instance(name).is_some() {
            return Err(NativeError::Duplicate(format!("instance '{name}'")));
        }
        self.document.root_assembly.instances.push(ArchiveInstance {
            name: name.to_string(),
            part: part.to_string(),
        });
        self.dirty = true;
        Ok(())
    }

    fn instance_names(&self) -> Vec<String> {
        self.document
            .root_assembly
            .instances
            .iter()
            .map(|i| i.name.clone())
            .collect()
    }

    fn node_labels(&self, instance: &str) -> Result<Vec<Label>> {
        self.document
            .instance_part(instance)?
            .node_labels()
            .map(native_label)
            .collect()
    }

    fn element_labels(&self, instance: &str) -> Result<Vec<Label>> {
        self.document
            .instance_part(instance)?
            .element_labels()
            .map(native_label)
            .collect()
    }

    fn create_section_category(&mut self, name: &str, description: &str) -> Result<()> {
        self.results_phase()?;
        if self.document.section_categories.iter().any(|c| c.name == name) {
            return Err(NativeError::Duplicate(format!("section category '{name}'")));
        }
        self.document.section_categories.push(SectionCategory {
            name: name.to_string(),
            description: description.to_string(),
            section_points: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    fn create_section_point(
        &mut self,
        category: &str,
        number: i32,
        description: &str,
    ) -> Result<SectionPointRef> {
        self.results_phase()?;
        let target = self
            .document
            .section_categories
            .iter_mut()
            .find(|c| c.name == category)
            .ok_or_else(|| NativeError::UnknownSectionCategory(category.to_string()))?;
        let exists = target
            .section_points
            .iter()
            .any(|p| p.number == number && p.description == description);
        if !exists {
            target.section_points.push(CategoryPoint {
                number,
                description: description.to_string(),
            });
            self.dirty = true;
        }
        Ok(SectionPointRef {
            category: category.to_string(),
            number,
            description: description.to_string(),
        })
    }

    fn create_step(&mut self, step: &NativeStep, time_period: f64) -> Result<()> {
        self.results_phase()?;
        if self.document.step(&step.name).is_some() {
            return Err(NativeError::Duplicate(format!("step '{}'", step.name)));
        }
        self.document.steps.push(ArchiveStep {
            step: step.clone(),
            time_period,
            frames: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    fn create_frame(&mut self, step: &str, frame: &NativeFrame) -> Result<()> {
        self.results_phase()?;
        let target = self.document.step_mut(step)?;
        if frame.increment_number != target.frames.len() {
            return Err(NativeError::InvalidData(format!(
                "frame {} created out of order in step '{step}' (next is {})",
                frame.increment_number,
                target.frames.len()
            )));
        }
        target.frames.push(ArchiveFrame {
            frame: frame.clone(),
            field_outputs: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    fn create_field_output(
        &mut self,
        step: &str,
        increment: usize,
        name: &str,
        description: &str,
    ) -> Result<()> {
        self.results_phase()?;
        let frame = self.document.frame_mut(step, increment)?;
        if frame.field_outputs.iter().any(|f| f.name == name) {
            return Err(NativeError::Duplicate(format!(
                "field output '{name}' in step '{step}' frame {increment}"
            )));
        }
        frame.field_outputs.push(ArchiveFieldOutput {
            name: name.to_string(),
            description: description.to_string(),
            field_type: SCALAR.to_string(),
            blocks: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    fn add_field_data(
        &mut self,
        step: &str,
        increment: usize,
        field: &str,
        block: FieldBlock<'_>,
    ) -> Result<()> {
        self.results_phase()?;
        if block.labels.len() != block.data.len() {
            return Err(NativeError::InvalidData(format!(
                "{} labels but {} values",
                block.labels.len(),
                block.data.len()
            )));
        }
        let part = self.document.instance_part(block.instance)?;
        let (kind, known): (&'static str, HashSet<i64>) = match block.position.label_kind() {
            LabelKind::Node => ("Node", part.node_labels().collect()),
            LabelKind::Element => ("Element", part.element_labels().collect()),
        };
        if let Some(&label) = block.labels.iter().find(|&&l| !known.contains(&i64::from(l))) {
            return Err(NativeError::UnknownLabel {
                instance: block.instance.to_string(),
                kind,
                label,
            });
        }
        if let Some(point) = block.section_point {
            let registered = self
                .document
                .section_categories
                .iter()
                .find(|c| c.name == point.category)
                .ok_or_else(|| NativeError::UnknownSectionCategory(point.category.clone()))?
                .section_points
                .iter()
                .any(|p| p.number == point.number && p.description == point.description);
            if !registered {
                return Err(NativeError::InvalidData(format!(
                    "section point {} is not registered in category '{}'",
                    point.number, point.category
                )));
            }
        }

        let output = self
            .document
            .frame_mut(step, increment)?
            .field_outputs
            .iter_mut()
            .find(|f| f.name == field)
            .ok_or_else(|| NativeError::UnknownField {
                step: step.to_string(),
                increment,
                field: field.to_string(),
            })?;
        output.blocks.push(ArchiveBlock {
            instance: block.instance.to_string(),
            position: block.position.as_str().to_string(),
            section_point: block.section_point.cloned(),
            labels: block.labels.to_vec(),
            data: block.data.to_vec(),
        });
        self.dirty = true;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if self.mode == SessionMode::Fresh {
            self.document.geometry_committed = true;
        }
        self.write_atomic()?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "saved archive");
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        if self.dirty {
            tracing::warn!(path = %self.path.display(), "closing archive with unsaved changes");
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for ArchiveSession {
    fn drop(&mut self) {
        if self.dirty {
            tracing::warn!(path = %self.path.display(), "archive handle dropped; unsaved changes discarded");
        }
    }
}
