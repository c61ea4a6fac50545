//! `mesh.json`: instance name → nodes and elements.
//!
//! ```json
//! {
//!   "PART-1-1": {
//!     "nodes": [{"label": 1, "coordinates": [0.0, 0.0, 0.0]}],
//!     "elements": [{"label": 1, "type": "DC3D8", "connectivity": [1, 2, 3, 4, 5, 6, 7, 8]}]
//!   }
//! }
//! ```
//!
//! Instance order in the document is the mesh order; it is preserved on
//! both write and read.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use odbx_model::{Element, ElementType, Instance, Mesh, Node, label_from_i64};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Artifact, FormatError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    label: i64,
    coordinates: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ElementRecord {
    label: i64,
    #[serde(rename = "type")]
    element_type: String,
    connectivity: Vec<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstanceRecord {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    elements: Vec<ElementRecord>,
}

/// Instances in document order; duplicate keys are kept so they can be
/// reported instead of silently overwritten.
#[derive(Debug, Default)]
struct MeshDocument(Vec<(String, InstanceRecord)>);

impl Serialize for MeshDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, record) in &self.0 {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MeshDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = MeshDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by instance name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<MeshDocument, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, record)) = access.next_entry::<String, InstanceRecord>()? {
                    entries.push((name, record));
                }
                Ok(MeshDocument(entries))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

impl MeshDocument {
    fn from_mesh(mesh: &Mesh) -> Self {
        let entries = mesh
            .instances()
            .iter()
            .map(|instance| {
                let nodes = instance
                    .nodes()
                    .iter()
                    .map(|n| NodeRecord {
                        label: i64::from(n.label),
                        coordinates: n.coordinates.to_vec(),
                    })
                    .collect();
                let elements = instance
                    .elements()
                    .iter()
                    .map(|e| ElementRecord {
                        label: i64::from(e.label),
                        element_type: e.element_type.as_str().to_string(),
                        connectivity: e.connectivity.iter().map(|&n| i64::from(n)).collect(),
                    })
                    .collect();
                (instance.name().to_string(), InstanceRecord { nodes, elements })
            })
            .collect();
        MeshDocument(entries)
    }

    fn into_mesh(self) -> std::result::Result<Mesh, FormatError> {
        let mut mesh = Mesh::new();
        for (name, record) in self.0 {
            let mut instance = Instance::new(name.as_str());

            for (i, node) in record.nodes.into_iter().enumerate() {
                let field = || format!("{name}.nodes[{i}]");
                let label = label_from_i64(node.label).map_err(|e| invalid(format!("{}.label", field()), e))?;
                if !(2..=3).contains(&node.coordinates.len()) {
                    return Err(invalid(
                        format!("{}.coordinates", field()),
                        format!("expected 2 or 3 coordinates, got {}", node.coordinates.len()),
                    ));
                }
                instance
                    .add_node(Node::from_native(label, &node.coordinates))
                    .map_err(|e| invalid(field(), e))?;
            }

            for (i, element) in record.elements.into_iter().enumerate() {
                let field = || format!("{name}.elements[{i}]");
                let label = label_from_i64(element.label)
                    .map_err(|e| invalid(format!("{}.label", field()), e))?;
                let element_type = ElementType::from_tag(&element.element_type)
                    .map_err(|e| invalid(format!("{}.type", field()), e))?;
                let connectivity = element
                    .connectivity
                    .iter()
                    .map(|&n| label_from_i64(n))
                    .collect::<odbx_model::Result<Vec<_>>>()
                    .map_err(|e| invalid(format!("{}.connectivity", field()), e))?;
                instance
                    .add_element(Element::new(label, element_type, connectivity))
                    .map_err(|e| invalid(format!("{}.connectivity", field()), e))?;
            }

            mesh.add_instance(instance).map_err(|e| invalid(name.clone(), e))?;
        }
        Ok(mesh)
    }
}

fn invalid(field: impl Into<String>, message: impl ToString) -> FormatError {
    FormatError::new(Artifact::Mesh, message.to_string()).in_field(field)
}

/// Write `mesh` as a whole document
pub fn write_mesh_to<W: Write>(mut writer: W, mesh: &Mesh) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, &MeshDocument::from_mesh(mesh))
        .map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_mesh(path: impl AsRef<Path>, mesh: &Mesh) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_mesh_to(BufWriter::new(file), mesh)?;
    tracing::debug!(path = %path.as_ref().display(), "wrote mesh document");
    Ok(())
}

/// Parse and validate a mesh document
pub fn read_mesh_from<R: Read>(reader: R) -> Result<Mesh> {
    let document: MeshDocument = serde_json::from_reader(reader)
        .map_err(|e| FormatError::from_json(Artifact::Mesh, &e))?;
    Ok(document.into_mesh()?)
}

pub fn read_mesh(path: impl AsRef<Path>) -> Result<Mesh> {
    let file = File::open(path)?;
    read_mesh_from(BufReader::new(file))
}
