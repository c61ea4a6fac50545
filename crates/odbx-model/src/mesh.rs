//! Mesh geometry: instances owning nodes and elements.
//!
//! Labels are the native, 1-based identifiers carried through the whole
//! migration; nothing in this module renumbers them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, Result};

/// Native node or element identifier. Always positive.
pub type Label = u32;

/// Convert a raw native label into a [`Label`], rejecting zero and negatives.
pub fn label_from_i64(raw: i64) -> Result<Label> {
    if raw <= 0 || raw > i64::from(u32::MAX) {
        return Err(ModelError::NonPositiveLabel(raw));
    }
    Ok(raw as Label)
}

/// A node of an instance
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node label (unique within the owning instance)
    pub label: Label,
    /// Coordinates, always three components
    pub coordinates: [f64; 3],
}

impl Node {
    pub fn new(label: Label, coordinates: [f64; 3]) -> Self {
        Self { label, coordinates }
    }

    /// Build a node from native coordinates, padding planar input with `z = 0`.
    pub fn from_native(label: Label, coordinates: &[f64]) -> Self {
        let mut padded = [0.0; 3];
        for (slot, value) in padded.iter_mut().zip(coordinates) {
            *slot = *value;
        }
        Self::new(label, padded)
    }
}

/// Element type vocabulary shared by every container version.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    // Heat transfer links, planar, axisymmetric and solid families
    DC1D2,
    DC1D3,
    DC2D3,
    DC2D4,
    DC2D6,
    DC2D8,
    DCAX3,
    DCAX4,
    DCAX6,
    DCAX8,
    DC3D4,
    DC3D6,
    DC3D8,
    DC3D10,
    DC3D15,
    DC3D20,
    // Forced convection/diffusion
    DCC1D2,
    DCC2D4,
    DCCAX4,
    DCC3D8,
    // Coupled thermal-electrical
    DC3D4E,
    DC3D8E,
    DC3D20E,
    // Heat transfer shells
    DS3,
    DS4,
    DS6,
    DS8,
    // Trusses and beams
    T2D2,
    T3D2,
    B31,
    B32,
    // Plane stress / plane strain / axisymmetric
    CPS3,
    CPS4,
    CPS4R,
    CPS4T,
    CPS6,
    CPS8,
    CPS8R,
    CPE3,
    CPE4,
    CPE4R,
    CPE4T,
    CPE6,
    CPE8,
    CPE8R,
    CAX3,
    CAX4,
    CAX4R,
    CAX4T,
    // Continuum solids, including coupled temperature-displacement
    C3D4,
    C3D4T,
    C3D6,
    C3D8,
    C3D8R,
    C3D8I,
    C3D8T,
    C3D8RT,
    C3D10,
    C3D15,
    C3D20,
    C3D20R,
    C3D20RT,
    // Structural shells
    S3,
    S3R,
    S4,
    S4R,
    S4R5,
    S8R,
    S8R5,
}

impl ElementType {
    /// Every supported type, in declaration order
    pub const ALL: [ElementType; 69] = [
        ElementType::DC1D2,
        ElementType::DC1D3,
        ElementType::DC2D3,
        ElementType::DC2D4,
        ElementType::DC2D6,
        ElementType::DC2D8,
        ElementType::DCAX3,
        ElementType::DCAX4,
        ElementType::DCAX6,
        ElementType::DCAX8,
        ElementType::DC3D4,
        ElementType::DC3D6,
        ElementType::DC3D8,
        ElementType::DC3D10,
        ElementType::DC3D15,
        ElementType::DC3D20,
        ElementType::DCC1D2,
        ElementType::DCC2D4,
        ElementType::DCCAX4,
        ElementType::DCC3D8,
        ElementType::DC3D4E,
        ElementType::DC3D8E,
        ElementType::DC3D20E,
        ElementType::DS3,
        ElementType::DS4,
        ElementType::DS6,
        ElementType::DS8,
        ElementType::T2D2,
        ElementType::T3D2,
        ElementType::B31,
        ElementType::B32,
        ElementType::CPS3,
        ElementType::CPS4,
        ElementType::CPS4R,
        ElementType::CPS4T,
        ElementType::CPS6,
        ElementType::CPS8,
        ElementType::CPS8R,
        ElementType::CPE3,
        ElementType::CPE4,
        ElementType::CPE4R,
        ElementType::CPE4T,
        ElementType::CPE6,
        ElementType::CPE8,
        ElementType::CPE8R,
        ElementType::CAX3,
        ElementType::CAX4,
        ElementType::CAX4R,
        ElementType::CAX4T,
        ElementType::C3D4,
        ElementType::C3D4T,
        ElementType::C3D6,
        ElementType::C3D8,
        ElementType::C3D8R,
        ElementType::C3D8I,
        ElementType::C3D8T,
        ElementType::C3D8RT,
        ElementType::C3D10,
        ElementType::C3D15,
        ElementType::C3D20,
        ElementType::C3D20R,
        ElementType::C3D20RT,
        ElementType::S3,
        ElementType::S3R,
        ElementType::S4,
        ElementType::S4R,
        ElementType::S4R5,
        ElementType::S8R,
        ElementType::S8R5,
    ];

    /// Canonical tag written to the mesh document
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::DC1D2 => "DC1D2",
            ElementType::DC1D3 => "DC1D3",
            ElementType::DC2D3 => "DC2D3",
            ElementType::DC2D4 => "DC2D4",
            ElementType::DC2D6 => "DC2D6",
            ElementType::DC2D8 => "DC2D8",
            ElementType::DCAX3 => "DCAX3",
            ElementType::DCAX4 => "DCAX4",
            ElementType::DCAX6 => "DCAX6",
            ElementType::DCAX8 => "DCAX8",
            ElementType::DC3D4 => "DC3D4",
            ElementType::DC3D6 => "DC3D6",
            ElementType::DC3D8 => "DC3D8",
            ElementType::DC3D10 => "DC3D10",
            ElementType::DC3D15 => "DC3D15",
            ElementType::DC3D20 => "DC3D20",
            ElementType::DCC1D2 => "DCC1D2",
            ElementType::DCC2D4 => "DCC2D4",
            ElementType::DCCAX4 => "DCCAX4",
            ElementType::DCC3D8 => "DCC3D8",
            ElementType::DC3D4E => "DC3D4E",
            ElementType::DC3D8E => "DC3D8E",
            ElementType::DC3D20E => "DC3D20E",
            ElementType::DS3 => "DS3",
            ElementType::DS4 => "DS4",
            ElementType::DS6 => "DS6",
            ElementType::DS8 => "DS8",
            ElementType::T2D2 => "T2D2",
            ElementType::T3D2 => "T3D2",
            ElementType::B31 => "B31",
            ElementType::B32 => "B32",
            ElementType::CPS3 => "CPS3",
            ElementType::CPS4 => "CPS4",
            ElementType::CPS4R => "CPS4R",
            ElementType::CPS4T => "CPS4T",
            ElementType::CPS6 => "CPS6",
            ElementType::CPS8 => "CPS8",
            ElementType::CPS8R => "CPS8R",
            ElementType::CPE3 => "CPE3",
            ElementType::CPE4 => "CPE4",
            ElementType::CPE4R => "CPE4R",
            ElementType::CPE4T => "CPE4T",
            ElementType::CPE6 => "CPE6",
            ElementType::CPE8 => "CPE8",
            ElementType::CPE8R => "CPE8R",
            ElementType::CAX3 => "CAX3",
            ElementType::CAX4 => "CAX4",
            ElementType::CAX4R => "CAX4R",
            ElementType::CAX4T => "CAX4T",
            ElementType::C3D4 => "C3D4",
            ElementType::C3D4T => "C3D4T",
            ElementType::C3D6 => "C3D6",
            ElementType::C3D8 => "C3D8",
            ElementType::C3D8R => "C3D8R",
            ElementType::C3D8I => "C3D8I",
            ElementType::C3D8T => "C3D8T",
            ElementType::C3D8RT => "C3D8RT",
            ElementType::C3D10 => "C3D10",
            ElementType::C3D15 => "C3D15",
            ElementType::C3D20 => "C3D20",
            ElementType::C3D20R => "C3D20R",
            ElementType::C3D20RT => "C3D20RT",
            ElementType::S3 => "S3",
            ElementType::S3R => "S3R",
            ElementType::S4 => "S4",
            ElementType::S4R => "S4R",
            ElementType::S4R5 => "S4R5",
            ElementType::S8R => "S8R",
            ElementType::S8R5 => "S8R5",
        }
    }

    /// Number of nodes in the connectivity of this element type
    pub fn num_nodes(self) -> usize {
        match self {
            ElementType::DC1D2 => 2,
            ElementType::DC1D3 => 3,
            ElementType::DC2D3 => 3,
            ElementType::DC2D4 => 4,
            ElementType::DC2D6 => 6,
            ElementType::DC2D8 => 8,
            ElementType::DCAX3 => 3,
            ElementType::DCAX4 => 4,
            ElementType::DCAX6 => 6,
            ElementType::DCAX8 => 8,
            ElementType::DC3D4 => 4,
            ElementType::DC3D6 => 6,
            ElementType::DC3D8 => 8,
            ElementType::DC3D10 => 10,
            ElementType::DC3D15 => 15,
            ElementType::DC3D20 => 20,
            ElementType::DCC1D2 => 2,
            ElementType::DCC2D4 => 4,
            ElementType::DCCAX4 => 4,
            ElementType::DCC3D8 => 8,
            ElementType::DC3D4E => 4,
            ElementType::DC3D8E => 8,
            ElementType::DC3D20E => 20,
            ElementType::DS3 => 3,
            ElementType::DS4 => 4,
            ElementType::DS6 => 6,
            ElementType::DS8 => 8,
            ElementType::T2D2 => 2,
            ElementType::T3D2 => 2,
            ElementType::B31 => 2,
            ElementType::B32 => 3,
            ElementType::CPS3 => 3,
            ElementType::CPS4 => 4,
            ElementType::CPS4R => 4,
            ElementType::CPS4T => 4,
            ElementType::CPS6 => 6,
            ElementType::CPS8 => 8,
            ElementType::CPS8R => 8,
            ElementType::CPE3 => 3,
            ElementType::CPE4 => 4,
            ElementType::CPE4R => 4,
            ElementType::CPE4T => 4,
            ElementType::CPE6 => 6,
            ElementType::CPE8 => 8,
            ElementType::CPE8R => 8,
            ElementType::CAX3 => 3,
            ElementType::CAX4 => 4,
            ElementType::CAX4R => 4,
            ElementType::CAX4T => 4,
            ElementType::C3D4 => 4,
            ElementType::C3D4T => 4,
            ElementType::C3D6 => 6,
            ElementType::C3D8 => 8,
            ElementType::C3D8R => 8,
            ElementType::C3D8I => 8,
            ElementType::C3D8T => 8,
            ElementType::C3D8RT => 8,
            ElementType::C3D10 => 10,
            ElementType::C3D15 => 15,
            ElementType::C3D20 => 20,
            ElementType::C3D20R => 20,
            ElementType::C3D20RT => 20,
            ElementType::S3 => 3,
            ElementType::S3R => 3,
            ElementType::S4 => 4,
            ElementType::S4R => 4,
            ElementType::S4R5 => 4,
            ElementType::S8R => 8,
            ElementType::S8R5 => 8,
        }
    }

    /// Parse a native type name, ignoring case and surrounding whitespace
    pub fn from_tag(tag: &str) -> Result<Self> {
        let upper = tag.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == upper)
            .ok_or_else(|| ModelError::UnknownElementType(tag.to_string()))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
    }
}

/// An element of an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element label (unique within the owning instance)
    pub label: Label,
    /// Element type tag
    pub element_type: ElementType,
    /// Node labels in connectivity order
    pub connectivity: Vec<Label>,
}

impl Element {
    pub fn new(label: Label, element_type: ElementType, connectivity: Vec<Label>) -> Self {
        Self {
            label,
            element_type,
            connectivity,
        }
    }

    /// Check that the connectivity length matches the element type
    pub fn validate(&self) -> Result<()> {
        let expected = self.element_type.num_nodes();
        if self.connectivity.len() != expected {
            return Err(ModelError::ConnectivityLength {
                element: self.label,
                element_type: self.element_type.to_string(),
                expected,
                actual: self.connectivity.len(),
            });
        }
        Ok(())
    }
}

/// A named geometric subdomain
#[derive(Debug, Clone, Default)]
pub struct Instance {
    name: String,
    nodes: Vec<Node>,
    elements: Vec<Element>,
    node_index: HashMap<Label, usize>,
    element_labels: HashSet<Label>,
}

impl Instance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in insertion (native) order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Elements in insertion (native) order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn node(&self, label: Label) -> Option<&Node> {
        self.node_index.get(&label).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, label: Label) -> bool {
        self.node_index.contains_key(&label)
    }

    pub fn contains_element(&self, label: Label) -> bool {
        self.element_labels.contains(&label)
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if node.label == 0 {
            return Err(ModelError::NonPositiveLabel(0));
        }
        if self.node_index.contains_key(&node.label) {
            return Err(ModelError::DuplicateNode {
                instance: self.name.clone(),
                label: node.label,
            });
        }
        self.node_index.insert(node.label, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add an element; its connectivity must already resolve to nodes of
    /// this instance.
    pub fn add_element(&mut self, element: Element) -> Result<()> {
        if element.label == 0 {
            return Err(ModelError::NonPositiveLabel(0));
        }
        element.validate()?;
        if let Some(&node) = element
            .connectivity
            .iter()
            .find(|label| !self.node_index.contains_key(*label))
        {
            return Err(ModelError::DanglingNode {
                instance: self.name.clone(),
                element: element.label,
                node,
            });
        }
        if !self.element_labels.insert(element.label) {
            return Err(ModelError::DuplicateElement {
                instance: self.name.clone(),
                label: element.label,
            });
        }
        self.elements.push(element);
        Ok(())
    }
}

/// Ordered collection of instances
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    instances: Vec<Instance>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&mut self, instance: Instance) -> Result<()> {
        if self.instance(instance.name()).is_some() {
            return Err(ModelError::DuplicateInstance(instance.name().to_string()));
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name() == name)
    }

    pub fn statistics(&self) -> MeshStatistics {
        let mut element_type_counts = BTreeMap::new();
        let mut num_nodes = 0;
        let mut num_elements = 0;
        for instance in &self.instances {
            num_nodes += instance.nodes().len();
            num_elements += instance.elements().len();
            for element in instance.elements() {
                *element_type_counts.entry(element.element_type).or_insert(0) += 1;
            }
        }
        MeshStatistics {
            num_instances: self.instances.len(),
            num_nodes,
            num_elements,
            element_type_counts,
        }
    }
}

/// Mesh statistics for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshStatistics {
    pub num_instances: usize,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub element_type_counts: BTreeMap<ElementType, usize>,
}

impl MeshStatistics {
    /// Format as a human-readable string
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!("Instances: {}", self.num_instances),
            format!("Nodes: {}", self.num_nodes),
            format!("Elements: {}", self.num_elements),
        ];
        if !self.element_type_counts.is_empty() {
            lines.push("Element types:".to_string());
            for (ty, count) in &self.element_type_counts {
                lines.push(format!("  {ty}: {count}"));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Instance {
        let mut inst = Instance::new("PART-1-1");
        for (label, xy) in [(1, [0.0, 0.0]), (2, [1.0, 0.0]), (3, [1.0, 1.0]), (4, [0.0, 1.0])] {
            inst.add_node(Node::from_native(label, &xy)).unwrap();
        }
        inst
    }

    #[test]
    fn planar_coordinates_are_padded() {
        let node = Node::from_native(7, &[1.5, -2.0]);
        assert_eq!(node.coordinates, [1.5, -2.0, 0.0]);
    }

    #[test]
    fn element_type_parsing() {
        assert_eq!(ElementType::from_tag("dc3d8").unwrap(), ElementType::DC3D8);
        assert_eq!(" C3D8R ".parse::<ElementType>().unwrap(), ElementType::C3D8R);
        assert_ne!(ElementType::C3D8R, ElementType::C3D8);
        assert!(matches!(
            ElementType::from_tag("XYZ9"),
            Err(ModelError::UnknownElementType(_))
        ));
    }

    #[test]
    fn every_tag_round_trips_through_its_name() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_tag(ty.as_str()).unwrap(), ty);
        }
        let mut tags: Vec<&str> = ElementType::ALL.iter().map(|ty| ty.as_str()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), ElementType::ALL.len());
    }

    #[test]
    fn coupled_and_convective_tags_are_known() {
        for (tag, nodes) in [
            ("DCC3D8", 8),
            ("DCC2D4", 4),
            ("DC3D8E", 8),
            ("C3D8RT", 8),
            ("CPE4T", 4),
            ("S4R5", 4),
        ] {
            assert_eq!(ElementType::from_tag(tag).unwrap().num_nodes(), nodes, "{tag}");
        }
    }

    #[test]
    fn element_requires_existing_nodes() {
        let mut inst = square();
        let err = inst
            .add_element(Element::new(1, ElementType::DC2D4, vec![1, 2, 3, 9]))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DanglingNode {
                instance: "PART-1-1".into(),
                element: 1,
                node: 9
            }
        );
        assert!(inst.elements().is_empty());
    }

    #[test]
    fn element_connectivity_length_is_checked() {
        let mut inst = square();
        let err = inst
            .add_element(Element::new(1, ElementType::DC3D8, vec![1, 2, 3, 4]))
            .unwrap_err();
        assert!(matches!(err, ModelError::ConnectivityLength { expected: 8, actual: 4, .. }));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut inst = square();
        assert!(inst.add_node(Node::new(1, [0.0; 3])).is_err());
        inst.add_element(Element::new(5, ElementType::DC2D4, vec![1, 2, 3, 4]))
            .unwrap();
        assert!(
            inst.add_element(Element::new(5, ElementType::DC2D3, vec![1, 2, 3]))
                .is_err()
        );
        assert!(inst.add_node(Node::new(0, [0.0; 3])).is_err());
    }

    #[test]
    fn mesh_keeps_instance_order_and_unique_names() {
        let mut mesh = Mesh::new();
        mesh.add_instance(Instance::new("B")).unwrap();
        mesh.add_instance(square()).unwrap();
        assert_eq!(
            mesh.add_instance(Instance::new("B")).unwrap_err(),
            ModelError::DuplicateInstance("B".into())
        );
        let names: Vec<_> = mesh.instances().iter().map(Instance::name).collect();
        assert_eq!(names, ["B", "PART-1-1"]);
    }

    #[test]
    fn mesh_statistics() {
        let mut inst = square();
        inst.add_element(Element::new(1, ElementType::DC2D4, vec![1, 2, 3, 4]))
            .unwrap();
        let mut mesh = Mesh::new();
        mesh.add_instance(inst).unwrap();
        let stats = mesh.statistics();
        assert_eq!(stats.num_nodes, 4);
        assert_eq!(stats.num_elements, 1);
        assert_eq!(stats.element_type_counts[&ElementType::DC2D4], 1);
        assert!(stats.format().contains("DC2D4: 1"));
    }

    #[test]
    fn native_labels_must_be_positive() {
        assert_eq!(label_from_i64(12).unwrap(), 12);
        assert_eq!(label_from_i64(0), Err(ModelError::NonPositiveLabel(0)));
        assert!(label_from_i64(-3).is_err());
    }
}
