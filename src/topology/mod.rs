//! B-rep topology: an arena of the entities read from one file, and the
//! numbered [`Solid`] view that the sampler and graph builder work on.

mod edge;
mod face;
pub(crate) mod solid;

pub use edge::{EdgeCurve, EdgeData, EdgeId};
pub use face::{FaceData, FaceId, FaceSurface};
pub use solid::{Edge, Face, LoopEdge, Root, Solid, SolidData, SolidId};

use slotmap::{Key, SlotMap};

use crate::error::TopologyError;
use crate::math::Point3;

slotmap::new_key_type! {
    pub struct VertexId;
    pub struct WireId;
    pub struct ShellId;
}

#[derive(Debug, Clone)]
pub struct VertexData {
    pub point: Point3,
}

/// Use of an edge inside a boundary loop.
#[derive(Debug, Clone, Copy)]
pub struct OrientedEdge {
    pub edge: EdgeId,
    /// `false` when the loop runs from the edge's end vertex to its start.
    pub forward: bool,
}

/// Boundary loop of a face, edges in loop order.
#[derive(Debug, Clone, Default)]
pub struct WireData {
    pub edges: Vec<OrientedEdge>,
}

/// Faces of one shell in file order.
#[derive(Debug, Clone, Default)]
pub struct ShellData {
    pub faces: Vec<FaceId>,
}

/// Arena owning the entities read from one file.
///
/// Entities refer to each other through generational keys. The loader
/// fills the store; [`Solid::assemble`] consumes it.
#[derive(Debug, Default)]
pub struct TopologyStore {
    vertices: SlotMap<VertexId, VertexData>,
    edges: SlotMap<EdgeId, EdgeData>,
    wires: SlotMap<WireId, WireData>,
    faces: SlotMap<FaceId, FaceData>,
    shells: SlotMap<ShellId, ShellData>,
    solids: SlotMap<SolidId, SolidData>,
}

fn lookup<'s, K: Key, V>(map: &'s SlotMap<K, V>, id: K, kind: &str) -> Result<&'s V, TopologyError> {
    map.get(id)
        .ok_or_else(|| TopologyError::EntityNotFound(format!("{kind} {:?}", id.data())))
}

impl TopologyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex at `point`.
    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices.insert(VertexData { point })
    }

    /// Adds an edge.
    pub fn add_edge(&mut self, data: EdgeData) -> EdgeId {
        self.edges.insert(data)
    }

    /// Adds a loop of oriented edges.
    pub fn add_wire(&mut self, edges: Vec<OrientedEdge>) -> WireId {
        self.wires.insert(WireData { edges })
    }

    /// Adds a face.
    pub fn add_face(&mut self, data: FaceData) -> FaceId {
        self.faces.insert(data)
    }

    /// Adds a shell of faces.
    pub fn add_shell(&mut self, faces: Vec<FaceId>) -> ShellId {
        self.shells.insert(ShellData { faces })
    }

    /// Adds a solid.
    pub fn add_solid(&mut self, data: SolidData) -> SolidId {
        self.solids.insert(data)
    }

    /// # Errors
    ///
    /// The lookups below return [`TopologyError::EntityNotFound`] for a key
    /// that was never inserted into this store.
    pub fn vertex(&self, id: VertexId) -> Result<&VertexData, TopologyError> {
        lookup(&self.vertices, id, "vertex")
    }

    /// # Errors
    ///
    /// See [`TopologyStore::vertex`].
    pub fn edge(&self, id: EdgeId) -> Result<&EdgeData, TopologyError> {
        lookup(&self.edges, id, "edge")
    }

    /// # Errors
    ///
    /// See [`TopologyStore::vertex`].
    pub fn wire(&self, id: WireId) -> Result<&WireData, TopologyError> {
        lookup(&self.wires, id, "wire")
    }

    /// # Errors
    ///
    /// See [`TopologyStore::vertex`].
    pub fn face(&self, id: FaceId) -> Result<&FaceData, TopologyError> {
        lookup(&self.faces, id, "face")
    }

    /// # Errors
    ///
    /// See [`TopologyStore::vertex`].
    pub fn shell(&self, id: ShellId) -> Result<&ShellData, TopologyError> {
        lookup(&self.shells, id, "shell")
    }

    /// # Errors
    ///
    /// See [`TopologyStore::vertex`].
    pub fn solid(&self, id: SolidId) -> Result<&SolidData, TopologyError> {
        lookup(&self.solids, id, "solid")
    }
}
