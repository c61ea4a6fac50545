//! Mesh extraction from a source container.

use std::collections::HashSet;

use odbx_model::{Element, ElementType, Instance, Mesh, Node, label_from_i64};
use odbx_native::{NativeElement, NativeNode, SourceRepository};

use crate::error::{ExtractionError, NativeResultExt, Result};

/// Copy every instance of `source` into a [`Mesh`], in native order
pub fn extract_mesh<S: SourceRepository>(source: &S) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    for name in source.instance_names() {
        let nodes = source
            .nodes(&name)
            .during(format!("enumerate nodes of instance '{name}'"))?;
        let elements = source
            .elements(&name)
            .during(format!("enumerate elements of instance '{name}'"))?;
        let instance = build_instance(&name, &nodes, &elements)?;
        tracing::debug!(
            instance = %name,
            nodes = instance.nodes().len(),
            elements = instance.elements().len(),
            "extracted instance"
        );
        mesh.add_instance(instance)
            .map_err(|e| invalid(&name, e))?;
    }
    let stats = mesh.statistics();
    tracing::info!(
        instances = stats.num_instances,
        nodes = stats.num_nodes,
        elements = stats.num_elements,
        "mesh extracted"
    );
    Ok(mesh)
}

fn build_instance(
    name: &str,
    nodes: &[NativeNode],
    elements: &[NativeElement],
) -> Result<Instance> {
    let mut instance = Instance::new(name);
    for node in nodes {
        let label = label_from_i64(node.label).map_err(|e| invalid(name, e))?;
        if node.coordinates.is_empty() || node.coordinates.len() > 3 {
            return Err(invalid(
                name,
                format!("node {label} has {} coordinates", node.coordinates.len()),
            )
            .into());
        }
        instance
            .add_node(Node::from_native(label, &node.coordinates))
            .map_err(|e| invalid(name, e))?;
    }

    let known: HashSet<i64> = nodes.iter().map(|n| n.label).collect();
    for element in elements {
        if let Some(&missing) = element.connectivity.iter().find(|n| !known.contains(*n)) {
            return Err(ExtractionError::DanglingNode {
                instance: name.to_string(),
                element: element.label,
                node: missing,
            }
            .into());
        }
        let label = label_from_i64(element.label).map_err(|e| invalid(name, e))?;
        let element_type =
            ElementType::from_tag(&element.type_name).map_err(|e| invalid(name, e))?;
        let connectivity = element
            .connectivity
            .iter()
            .map(|&n| label_from_i64(n))
            .collect::<odbx_model::Result<Vec<_>>>()
            .map_err(|e| invalid(name, e))?;
        instance
            .add_element(Element::new(label, element_type, connectivity))
            .map_err(|e| invalid(name, e))?;
    }
    Ok(instance)
}

fn invalid(instance: &str, message: impl ToString) -> ExtractionError {
    ExtractionError::InvalidGeometry {
        instance: instance.to_string(),
        message: message.to_string(),
    }
}
