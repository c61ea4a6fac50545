//! NT11 field buckets.
//!
//! A bucket holds every value of one frame that shares an instance, a
//! position kind and (optionally) a section point. Labels and values are
//! parallel sequences: the value at `values[i]` belongs to `labels[i]`,
//! and that positional pairing is the only join between geometry and
//! result data.

use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};
use crate::mesh::Label;

/// How field values are anchored to geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionKind {
    /// One value per node
    Nodal,
    /// One value per (element, element node)
    ElementNodal,
    /// One value per (element, integration point)
    IntegrationPoint,
    /// One value per element
    WholeElement,
}

/// Which geometric entity a bucket label refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Node,
    Element,
}

impl PositionKind {
    /// All supported kinds, in export order
    pub const ALL: [PositionKind; 4] = [
        PositionKind::Nodal,
        PositionKind::ElementNodal,
        PositionKind::IntegrationPoint,
        PositionKind::WholeElement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PositionKind::Nodal => "NODAL",
            PositionKind::ElementNodal => "ELEMENT_NODAL",
            PositionKind::IntegrationPoint => "INTEGRATION_POINT",
            PositionKind::WholeElement => "WHOLE_ELEMENT",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "NODAL" => Ok(PositionKind::Nodal),
            "ELEMENT_NODAL" => Ok(PositionKind::ElementNodal),
            "INTEGRATION_POINT" => Ok(PositionKind::IntegrationPoint),
            "WHOLE_ELEMENT" => Ok(PositionKind::WholeElement),
            other => Err(ModelError::UnknownPosition(other.to_string())),
        }
    }

    /// Entity the labels of a bucket at this position refer to
    pub fn label_kind(self) -> LabelKind {
        match self {
            PositionKind::Nodal => LabelKind::Node,
            PositionKind::ElementNodal
            | PositionKind::IntegrationPoint
            | PositionKind::WholeElement => LabelKind::Element,
        }
    }

    /// Whether through-thickness sampling is meaningful at this position
    pub fn admits_section_point(self) -> bool {
        match self {
            PositionKind::ElementNodal | PositionKind::IntegrationPoint => true,
            PositionKind::Nodal | PositionKind::WholeElement => false,
        }
    }
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Through-thickness sampling location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionPoint {
    pub number: i32,
    pub description: String,
}

impl SectionPoint {
    pub fn new(number: i32, description: impl Into<String>) -> Self {
        Self {
            number,
            description: description.into(),
        }
    }
}

/// Where a bucket's values live
#[derive(Debug, Clone, PartialEq)]
pub struct BucketScope {
    pub step: String,
    pub frame_index: usize,
    /// Source frame time, carried alongside the index
    pub frame_value: f64,
    pub instance: String,
    pub position: PositionKind,
    pub section_point: Option<SectionPoint>,
}

/// One block of NT11 values with their owning labels
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBucket {
    scope: BucketScope,
    labels: Vec<Label>,
    values: Vec<[f64; 1]>,
}

impl FieldBucket {
    pub fn new(scope: BucketScope, labels: Vec<Label>, values: Vec<[f64; 1]>) -> Result<Self> {
        if labels.len() != values.len() {
            return Err(ModelError::LengthMismatch {
                labels: labels.len(),
                values: values.len(),
            });
        }
        if labels.is_empty() {
            return Err(ModelError::EmptyBucket);
        }
        if scope.section_point.is_some() && !scope.position.admits_section_point() {
            return Err(ModelError::SectionPointNotAdmitted(scope.position.to_string()));
        }
        if labels.contains(&0) {
            return Err(ModelError::NonPositiveLabel(0));
        }
        Ok(Self {
            scope,
            labels,
            values,
        })
    }

    pub fn scope(&self) -> &BucketScope {
        &self.scope
    }

    pub fn step(&self) -> &str {
        &self.scope.step
    }

    pub fn frame_index(&self) -> usize {
        self.scope.frame_index
    }

    pub fn frame_value(&self) -> f64 {
        self.scope.frame_value
    }

    pub fn instance(&self) -> &str {
        &self.scope.instance
    }

    pub fn position(&self) -> PositionKind {
        self.scope.position
    }

    pub fn section_point(&self) -> Option<&SectionPoint> {
        self.scope.section_point.as_ref()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn values(&self) -> &[[f64; 1]] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (label, value) pairs in bucket order
    pub fn pairs(&self) -> impl Iterator<Item = (Label, f64)> + '_ {
        self.labels
            .iter()
            .zip(&self.values)
            .map(|(&label, &[value])| (label, value))
    }
}
