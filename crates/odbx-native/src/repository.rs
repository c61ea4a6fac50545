//! Repository traits over native result containers.
//!
//! These traits are the only way extraction and reconstruction touch a
//! native object model. Records crossing this boundary use native
//! vocabulary (raw labels, type names, position names); normalization
//! into the version-neutral model happens on the caller's side.

use odbx_model::{Label, PositionKind};
use serde::{Deserialize, Serialize};

use crate::error::{NativeError, Result};

/// Node as stored by the native container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeNode {
    pub label: i64,
    /// Two or three components, depending on the embedding space
    pub coordinates: Vec<f64>,
}

/// Element as stored by the native container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeElement {
    pub label: i64,
    #[serde(rename = "type")]
    pub type_name: String,
    pub connectivity: Vec<i64>,
}

/// Step metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeStep {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    odbx_model::TIME_DOMAIN.to_string()
}

/// Frame metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFrame {
    pub increment_number: usize,
    pub frame_value: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeSectionPoint {
    pub number: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One value of a field output, as enumerated by the native API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeFieldValue {
    pub instance: String,
    pub position: String,
    #[serde(default)]
    pub section_point: Option<NativeSectionPoint>,
    #[serde(default)]
    pub node_label: Option<i64>,
    #[serde(default)]
    pub element_label: Option<i64>,
    /// Scalar fields carry exactly one component
    pub data: Vec<f64>,
}

/// Handle to a section point created in a target container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionPointRef {
    pub category: String,
    pub number: i32,
    pub description: String,
}

/// One `addData` call: values for a single instance and position
#[derive(Debug, Clone, Copy)]
pub struct FieldBlock<'a> {
    pub instance: &'a str,
    pub position: PositionKind,
    pub section_point: Option<&'a SectionPointRef>,
    pub labels: &'a [Label],
    pub data: &'a [[f64; 1]],
}

/// Read access to a source container.
///
/// Every enumeration preserves native order.
pub trait SourceRepository {
    fn instance_names(&self) -> Vec<String>;

    fn nodes(&self, instance: &str) -> Result<Vec<NativeNode>>;

    fn elements(&self, instance: &str) -> Result<Vec<NativeElement>>;

    fn steps(&self) -> Vec<NativeStep>;

    fn frames(&self, step: &str) -> Result<Vec<NativeFrame>>;

    /// Values of field output `field` in the frame at position `frame` of
    /// `step`, or `None` when that frame has no such output.
    fn field_values(
        &self,
        step: &str,
        frame: usize,
        field: &str,
    ) -> Result<Option<Vec<NativeFieldValue>>>;
}

/// Write access to a target container.
///
/// Geometry operations and results operations are only valid in
/// different phases of a container's life; implementations report
/// [`NativeError::GeometryNotCommitted`] or [`NativeError::GeometryFrozen`]
/// when called in the wrong one.
pub trait TargetRepository {
    fn create_part(&mut self, name: &str) -> Result<()>;

    fn add_nodes(&mut self, part: &str, nodes: &[NativeNode]) -> Result<()>;

    /// Add elements that all share `type_name`
    fn add_elements(&mut self, part: &str, type_name: &str, elements: &[NativeElement])
    -> Result<()>;

    fn create_instance(&mut self, name: &str, part: &str) -> Result<()>;

    fn instance_names(&self) -> Vec<String>;

    fn node_labels(&self, instance: &str) -> Result<Vec<Label>>;

    fn element_labels(&self, instance: &str) -> Result<Vec<Label>>;

    fn create_section_category(&mut self, name: &str, description: &str) -> Result<()>;

    fn create_section_point(
        &mut self,
        category: &str,
        number: i32,
        description: &str,
    ) -> Result<SectionPointRef>;

    fn create_step(&mut self, step: &NativeStep, time_period: f64) -> Result<()>;

    fn create_frame(&mut self, step: &str, frame: &NativeFrame) -> Result<()>;

    fn create_field_output(
        &mut self,
        step: &str,
        increment: usize,
        name: &str,
        description: &str,
    ) -> Result<()>;

    fn add_field_data(
        &mut self,
        step: &str,
        increment: usize,
        field: &str,
        block: FieldBlock<'_>,
    ) -> Result<()>;

    /// Persist the container to its backing store
    fn save(&mut self) -> Result<()>;

    /// Release the handle; unsaved changes are discarded
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Factory for target handles bound to one backing store
pub trait TargetBackend {
    type Handle: TargetRepository;

    /// Create a fresh, empty container. Fails if one already exists.
    fn create(&self) -> Result<Self::Handle>;

    /// Open the existing container for writing results
    fn open(&self) -> Result<Self::Handle>;
}

/// Convert a native label into a [`Label`]
pub fn native_label(raw: i64) -> Result<Label> {
    odbx_model::label_from_i64(raw).map_err(|e| NativeError::InvalidData(e.to_string()))
}
