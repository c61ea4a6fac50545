//! Target geometry construction and the commit/reopen cycle.
//!
//! The target runtime only accepts field data on a handle opened after
//! the geometry was saved. [`ModelHandle`] tracks where a handle is in
//! that lifecycle:
//!
//! ```text
//! Empty --build_geometry--> GeometryCreated --commit_and_reopen--> CommittedAndReopened
//! ```

use odbx_model::{ElementType, Instance, Mesh};
use odbx_native::{NativeElement, NativeError, NativeNode, TargetBackend, TargetRepository};

use crate::config::ImportConfig;
use crate::error::{NativeResultExt, Result, RuntimeError};

/// Lifecycle state of a target handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Empty,
    GeometryCreated,
    CommittedAndReopened,
}

/// A target handle together with its lifecycle state.
///
/// Owned by the Model Builder until the geometry is committed, then
/// handed to the Field Writer. Dropping it releases the handle without
/// saving.
#[derive(Debug)]
pub struct ModelHandle<H: TargetRepository> {
    handle: H,
    state: BuildState,
}

impl<H: TargetRepository> ModelHandle<H> {
    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn repository(&self) -> &H {
        &self.handle
    }

    pub(crate) fn repository_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn close(self) -> std::result::Result<(), RuntimeError> {
        self.handle.close().during("close target")
    }
}

/// Counts of geometry written to the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometrySummary {
    pub instances: usize,
    pub nodes: usize,
    pub elements: usize,
}

/// Creates target geometry from a [`Mesh`]
pub struct ModelBuilder<'a, B: TargetBackend> {
    backend: &'a B,
    config: &'a ImportConfig,
}

impl<'a, B: TargetBackend> ModelBuilder<'a, B> {
    pub fn new(backend: &'a B, config: &'a ImportConfig) -> Self {
        Self { backend, config }
    }

    /// Create a fresh, empty target
    pub fn create(&self) -> std::result::Result<ModelHandle<B::Handle>, RuntimeError> {
        let handle = self.backend.create().during("create target")?;
        Ok(ModelHandle {
            handle,
            state: BuildState::Empty,
        })
    }

    /// Write every instance of `mesh`: one part per instance, elements
    /// grouped by type in first-appearance order, then the instance.
    pub fn build_geometry(
        &self,
        model: &mut ModelHandle<B::Handle>,
        mesh: &Mesh,
    ) -> std::result::Result<GeometrySummary, RuntimeError> {
        if model.state != BuildState::Empty {
            return Err(RuntimeError::new("create geometry", NativeError::GeometryFrozen));
        }
        let mut summary = GeometrySummary::default();
        for instance in mesh.instances() {
            self.write_instance(&mut model.handle, instance)?;
            summary.instances += 1;
            summary.nodes += instance.nodes().len();
            summary.elements += instance.elements().len();
        }
        model.state = BuildState::GeometryCreated;
        tracing::info!(
            instances = summary.instances,
            nodes = summary.nodes,
            elements = summary.elements,
            "geometry created"
        );
        Ok(summary)
    }

    fn write_instance(
        &self,
        handle: &mut B::Handle,
        instance: &Instance,
    ) -> std::result::Result<(), RuntimeError> {
        let name = instance.name();
        let part = self.config.part_name(name);
        handle
            .create_part(&part)
            .during(format!("create part '{part}'"))?;

        let nodes: Vec<NativeNode> = instance
            .nodes()
            .iter()
            .map(|n| NativeNode {
                label: i64::from(n.label),
                coordinates: n.coordinates.to_vec(),
            })
            .collect();
        handle
            .add_nodes(&part, &nodes)
            .during(format!("add nodes to part '{part}'"))?;

        let mut blocks: Vec<(ElementType, Vec<NativeElement>)> = Vec::new();
        for element in instance.elements() {
            let native = NativeElement {
                label: i64::from(element.label),
                type_name: element.element_type.as_str().to_string(),
                connectivity: element.connectivity.iter().map(|&n| i64::from(n)).collect(),
            };
            match blocks.iter_mut().find(|(t, _)| *t == element.element_type) {
                Some((_, block)) => block.push(native),
                None => blocks.push((element.element_type, vec![native])),
            }
        }
        for (element_type, block) in &blocks {
            handle
                .add_elements(&part, element_type.as_str(), block)
                .during(format!("add {element_type} elements to part '{part}'"))?;
        }

        handle
            .create_instance(name, &part)
            .during(format!("create instance '{name}'"))?;
        tracing::debug!(instance = name, part = %part, element_blocks = blocks.len(), "instance created");
        Ok(())
    }

    /// Save, close and reopen the target so results can be attached
    pub fn commit_and_reopen(
        &self,
        model: ModelHandle<B::Handle>,
    ) -> std::result::Result<ModelHandle<B::Handle>, RuntimeError> {
        if model.state != BuildState::GeometryCreated {
            return Err(RuntimeError::new(
                "commit geometry",
                NativeError::InvalidData(format!("target is {:?}, expected GeometryCreated", model.state)),
            ));
        }
        let mut handle = model.handle;
        handle.save().during("save geometry")?;
        handle.close().during("close target after geometry commit")?;
        let handle = self.backend.open().during("reopen target")?;
        tracing::info!("geometry committed; target reopened");
        Ok(ModelHandle {
            handle,
            state: BuildState::CommittedAndReopened,
        })
    }

    /// Run the whole lifecycle for `mesh`
    pub fn build(&self, mesh: &Mesh) -> Result<(ModelHandle<B::Handle>, GeometrySummary)> {
        let mut model = self.create()?;
        let summary = self.build_geometry(&mut model, mesh)?;
        let model = self.commit_and_reopen(model)?;
        Ok((model, summary))
    }
}
