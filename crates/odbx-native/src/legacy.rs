//! Legacy (version 1) result container.
//!
//! A read-only view over an archive written by the older runtime. The
//! whole archive is a single JSON document; field outputs hang off each
//! frame, keyed by field name.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NativeError, Result};
use crate::repository::{
    NativeElement, NativeFieldValue, NativeFrame, NativeNode, NativeStep, SourceRepository,
};

pub const ARCHIVE_FORMAT: &str = "odb-archive";
pub const LEGACY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDocument {
    pub format: String,
    pub version: u32,
    pub root_assembly: LegacyAssembly,
    #[serde(default)]
    pub steps: Vec<LegacyStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyAssembly {
    #[serde(default)]
    pub instances: Vec<LegacyInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyInstance {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NativeNode>,
    #[serde(default)]
    pub elements: Vec<NativeElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyStep {
    #[serde(flatten)]
    pub step: NativeStep,
    #[serde(default)]
    pub frames: Vec<LegacyFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFrame {
    #[serde(flatten)]
    pub frame: NativeFrame,
    #[serde(default)]
    pub field_outputs: BTreeMap<String, LegacyFieldOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyFieldOutput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub values: Vec<NativeFieldValue>,
}

impl Default for LegacyDocument {
    fn default() -> Self {
        Self {
            format: ARCHIVE_FORMAT.to_string(),
            version: LEGACY_VERSION,
            root_assembly: LegacyAssembly::default(),
            steps: Vec::new(),
        }
    }
}

impl LegacyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instance and return it for population
    pub fn add_instance(&mut self, name: impl Into<String>) -> &mut LegacyInstance {
        self.root_assembly.instances.push(LegacyInstance {
            name: name.into(),
            nodes: Vec::new(),
            elements: Vec::new(),
        });
        let last = self.root_assembly.instances.len() - 1;
        &mut self.root_assembly.instances[last]
    }

    /// Append a step and return it for population
    pub fn add_step(&mut self, name: impl Into<String>, description: impl Into<String>)
    -> &mut LegacyStep {
        self.steps.push(LegacyStep {
            step: NativeStep {
                name: name.into(),
                description: description.into(),
                domain: odbx_model::TIME_DOMAIN.to_string(),
            },
            frames: Vec::new(),
        });
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }
}

impl LegacyInstance {
    pub fn node(&mut self, label: i64, coordinates: &[f64]) -> &mut Self {
        self.nodes.push(NativeNode {
            label,
            coordinates: coordinates.to_vec(),
        });
        self
    }

    pub fn element(&mut self, label: i64, type_name: &str, connectivity: &[i64]) -> &mut Self {
        self.elements.push(NativeElement {
            label,
            type_name: type_name.to_string(),
            connectivity: connectivity.to_vec(),
        });
        self
    }
}

impl LegacyStep {
    /// Append a frame; its increment number is its position
    pub fn add_frame(&mut self, frame_value: f64, description: impl Into<String>)
    -> &mut LegacyFrame {
        let increment_number = self.frames.len();
        self.frames.push(LegacyFrame {
            frame: NativeFrame {
                increment_number,
                frame_value,
                description: description.into(),
            },
            field_outputs: BTreeMap::new(),
        });
        &mut self.frames[increment_number]
    }
}

impl LegacyFrame {
    pub fn field_output(&mut self, name: &str) -> &mut LegacyFieldOutput {
        self.field_outputs.entry(name.to_string()).or_default()
    }
}

impl LegacyFieldOutput {
    /// Append a nodal value
    pub fn nodal(&mut self, instance: &str, node: i64, value: f64) -> &mut Self {
        self.values.push(NativeFieldValue {
            instance: instance.to_string(),
            position: "NODAL".to_string(),
            section_point: None,
            node_label: Some(node),
            element_label: None,
            data: vec![value],
        });
        self
    }

    pub fn push(&mut self, value: NativeFieldValue) -> &mut Self {
        self.values.push(value);
        self
    }
}

/// Source container opened read-only
#[derive(Debug, Clone)]
pub struct LegacyArchive {
    document: LegacyDocument,
}

impl LegacyArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NativeError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let document: LegacyDocument = serde_json::from_slice(&bytes)?;
        let archive = Self::from_document(document)?;
        tracing::debug!(
            path = %path.display(),
            instances = archive.document.root_assembly.instances.len(),
            steps = archive.document.steps.len(),
            "opened legacy archive"
        );
        Ok(archive)
    }

    pub fn from_document(document: LegacyDocument) -> Result<Self> {
        if document.format != ARCHIVE_FORMAT {
            return Err(NativeError::Corrupt(format!(
                "unexpected format tag '{}'",
                document.format
            )));
        }
        if document.version != LEGACY_VERSION {
            return Err(NativeError::UnsupportedVersion {
                expected: LEGACY_VERSION,
                found: document.version,
            });
        }
        Ok(Self { document })
    }

    pub fn document(&self) -> &LegacyDocument {
        &self.document
    }

    /// Write the archive to `path`, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.document)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn instance(&self, name: &str) -> Result<&LegacyInstance> {
        self.document
            .root_assembly
            .instances
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| NativeError::UnknownInstance(name.to_string()))
    }

    fn step(&self, name: &str) -> Result<&LegacyStep> {
        self.document
            .steps
            .iter()
            .find(|s| s.step.name == name)
            .ok_or_else(|| NativeError::UnknownStep(name.to_string()))
    }
}

impl SourceRepository for LegacyArchive {
    fn instance_names(&self) -> Vec<String> {
        self.document
            .root_assembly
            .instances
            .iter()
            .map(|i| i.name.clone())
            .collect()
    }

    fn nodes(&self, instance: &str) -> Result<Vec<NativeNode>> {
        Ok(self.instance(instance)?.nodes.clone())
    }

    fn elements(&self, instance: &str) -> Result<Vec<NativeElement>> {
        Ok(self.instance(instance)?.elements.clone())
    }

    fn steps(&self) -> Vec<NativeStep> {
        self.document.steps.iter().map(|s| s.step.clone()).collect()
    }

    fn frames(&self, step: &str) -> Result<Vec<NativeFrame>> {
        Ok(self.step(step)?.frames.iter().map(|f| f.frame.clone()).collect())
    }

    fn field_values(
        &self,
        step: &str,
        frame: usize,
        field: &str,
    ) -> Result<Option<Vec<NativeFieldValue>>> {
        let frame_data = self
            .step(step)?
            .frames
            .get(frame)
            .ok_or_else(|| NativeError::UnknownFrame {
                step: step.to_string(),
                increment: frame,
            })?;
        Ok(frame_data.field_outputs.get(field).map(|f| f.values.clone()))
    }
}
