use std::path::{Path, PathBuf};

use slotmap::SecondaryMap;

use crate::error::TopologyError;
use crate::geometry::surface::SurfaceKind;
use crate::math::Point3;

use super::edge::{EdgeCurve, EdgeData, EdgeId};
use super::face::{FaceData, FaceId, FaceSurface};
use super::{ShellId, TopologyStore, VertexId};

slotmap::new_key_type! {
    /// Unique identifier for a solid in the topology store.
    pub struct SolidId;
}

/// Data associated with a topological solid.
///
/// A solid is a bounded volume enclosed by one or more shells.
/// The first shell is the outer shell; additional shells represent voids.
#[derive(Debug, Clone)]
pub struct SolidData {
    /// The outer shell of the solid.
    pub outer_shell: ShellId,
    /// Inner shells representing voids within the solid.
    pub inner_shells: Vec<ShellId>,
}

/// Where face traversal starts when a [`Solid`] is assembled.
#[derive(Debug, Clone)]
pub enum Root {
    /// A solid: outer shell first, then voids.
    Solid(SolidId),
    /// A list of shells, in order.
    Shells(Vec<ShellId>),
    /// Loose faces, in order.
    Faces(Vec<FaceId>),
}

/// One edge use inside a face boundary loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopEdge {
    /// Index of the edge in [`Solid`] traversal order.
    pub edge: usize,
    /// `true` when the loop runs from the edge's start to its end vertex.
    pub forward: bool,
}

/// A loaded B-rep body.
///
/// Faces, edges and vertices are numbered in the order a depth-first walk
/// meets them: shells in root order, faces in shell order, boundary loops
/// outer first, edges in loop order. The numbering only depends on the file
/// contents, so reloading the same file reproduces it exactly.
#[derive(Debug)]
pub struct Solid {
    store: TopologyStore,
    source: Option<PathBuf>,
    faces: Vec<FaceId>,
    edges: Vec<EdgeId>,
    vertex_points: Vec<Point3>,
    face_loops: Vec<Vec<Vec<LoopEdge>>>,
    edge_faces: Vec<Vec<usize>>,
    edge_vertices: Vec<[usize; 2]>,
}

impl Solid {
    /// Freezes `store` and numbers every entity reachable from `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` references an entity missing from the store.
    pub fn assemble(store: TopologyStore, root: &Root) -> Result<Self, TopologyError> {
        let face_ids: Vec<FaceId> = match root {
            Root::Solid(id) => {
                let solid = store.solid(*id)?;
                let mut faces = Vec::new();
                for shell in std::iter::once(&solid.outer_shell).chain(&solid.inner_shells) {
                    faces.extend_from_slice(&store.shell(*shell)?.faces);
                }
                faces
            }
            Root::Shells(shells) => {
                let mut faces = Vec::new();
                for shell in shells {
                    faces.extend_from_slice(&store.shell(*shell)?.faces);
                }
                faces
            }
            Root::Faces(faces) => faces.clone(),
        };

        let mut seen_faces: SecondaryMap<FaceId, ()> = SecondaryMap::new();
        let mut edge_index: SecondaryMap<EdgeId, usize> = SecondaryMap::new();
        let mut vertex_index: SecondaryMap<VertexId, usize> = SecondaryMap::new();
        let mut faces = Vec::new();
        let mut edges = Vec::new();
        let mut vertex_points = Vec::new();
        let mut face_loops = Vec::new();
        let mut edge_faces: Vec<Vec<usize>> = Vec::new();
        let mut edge_vertices = Vec::new();

        for face_id in face_ids {
            if seen_faces.insert(face_id, ()).is_some() {
                continue;
            }
            let face_idx = faces.len();
            let face = store.face(face_id)?;
            let mut loops = Vec::new();
            for wire_id in face.wires() {
                let wire = store.wire(wire_id)?;
                let mut uses = Vec::with_capacity(wire.edges.len());
                for oe in &wire.edges {
                    let edge_idx = if let Some(&i) = edge_index.get(oe.edge) {
                        i
                    } else {
                        let edge = store.edge(oe.edge)?;
                        let mut ends = [0; 2];
                        for (slot, vid) in ends.iter_mut().zip([edge.start, edge.end]) {
                            *slot = if let Some(&v) = vertex_index.get(vid) {
                                v
                            } else {
                                let v = vertex_points.len();
                                vertex_points.push(store.vertex(vid)?.point);
                                vertex_index.insert(vid, v);
                                v
                            };
                        }
                        let i = edges.len();
                        edges.push(oe.edge);
                        edge_index.insert(oe.edge, i);
                        edge_faces.push(Vec::new());
                        edge_vertices.push(ends);
                        i
                    };
                    if !edge_faces[edge_idx].contains(&face_idx) {
                        edge_faces[edge_idx].push(face_idx);
                    }
                    uses.push(LoopEdge {
                        edge: edge_idx,
                        forward: oe.forward,
                    });
                }
                loops.push(uses);
            }
            faces.push(face_id);
            face_loops.push(loops);
        }

        Ok(Self {
            store,
            source: None,
            faces,
            edges,
            vertex_points,
            face_loops,
            edge_faces,
            edge_vertices,
        })
    }

    /// Records the file the solid was read from.
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// The file the solid was read from, if known.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of faces.
    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertex_points.len()
    }

    /// Returns the face with traversal index `index`.
    #[must_use]
    pub fn face(&self, index: usize) -> Option<Face<'_>> {
        let id = *self.faces.get(index)?;
        let data = self.store.face(id).ok()?;
        Some(Face {
            solid: self,
            index,
            data,
        })
    }

    /// Iterates over faces in traversal order.
    pub fn faces(&self) -> impl Iterator<Item = Face<'_>> + '_ {
        (0..self.faces.len()).filter_map(|i| self.face(i))
    }

    /// Returns the edge with traversal index `index`.
    #[must_use]
    pub fn edge(&self, index: usize) -> Option<Edge<'_>> {
        let id = *self.edges.get(index)?;
        let data = self.store.edge(id).ok()?;
        Some(Edge {
            solid: self,
            index,
            data,
        })
    }

    /// Iterates over edges in traversal order.
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> + '_ {
        (0..self.edges.len()).filter_map(|i| self.edge(i))
    }

    /// Position of the vertex with traversal index `index`.
    #[must_use]
    pub fn vertex_point(&self, index: usize) -> Option<Point3> {
        self.vertex_points.get(index).copied()
    }
}

/// Read-only view of one face of a [`Solid`].
#[derive(Debug, Clone, Copy)]
pub struct Face<'a> {
    solid: &'a Solid,
    index: usize,
    data: &'a FaceData,
}

impl<'a> Face<'a> {
    /// Stable face identifier (traversal index).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Surface type tag.
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        self.data.surface.kind()
    }

    /// The surface the face lies on.
    #[must_use]
    pub fn surface(&self) -> &'a FaceSurface {
        &self.data.surface
    }

    /// Whether the face normal agrees with the surface normal.
    #[must_use]
    pub fn same_sense(&self) -> bool {
        self.data.same_sense
    }

    /// Entity id in the source file.
    #[must_use]
    pub fn source_id(&self) -> u32 {
        self.data.source_id
    }

    /// Boundary loops, outer first, each as oriented edge uses.
    #[must_use]
    pub fn loops(&self) -> &'a [Vec<LoopEdge>] {
        &self.solid.face_loops[self.index]
    }

    /// The solid this face belongs to.
    #[must_use]
    pub fn solid(&self) -> &'a Solid {
        self.solid
    }
}

/// Read-only view of one edge of a [`Solid`].
#[derive(Debug, Clone, Copy)]
pub struct Edge<'a> {
    solid: &'a Solid,
    index: usize,
    data: &'a EdgeData,
}

impl<'a> Edge<'a> {
    /// Stable edge identifier (traversal index).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Faces using this edge, in traversal order without repeats.
    #[must_use]
    pub fn faces(&self) -> &'a [usize] {
        &self.solid.edge_faces[self.index]
    }

    /// The edge's curve.
    #[must_use]
    pub fn curve(&self) -> &'a EdgeCurve {
        &self.data.curve
    }

    /// Curve parameters at the start and end vertex.
    #[must_use]
    pub fn parameter_range(&self) -> (f64, f64) {
        (self.data.t_start, self.data.t_end)
    }

    /// Start vertex position.
    #[must_use]
    pub fn start_point(&self) -> Point3 {
        self.solid.vertex_points[self.solid.edge_vertices[self.index][0]]
    }

    /// End vertex position.
    #[must_use]
    pub fn end_point(&self) -> Point3 {
        self.solid.vertex_points[self.solid.edge_vertices[self.index][1]]
    }

    /// Entity id in the source file.
    #[must_use]
    pub fn source_id(&self) -> u32 {
        self.data.source_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::curve::{CurveGeometry, Line};
    use crate::geometry::surface::{Plane, SurfaceGeometry};
    use crate::math::Frame;
    use crate::topology::OrientedEdge;

    /// Two unit squares in the z = 0 plane sharing the edge x = 1.
    pub(crate) fn two_squares() -> Solid {
        let mut store = TopologyStore::new();
        let pts = [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ];
        let v: Vec<VertexId> = pts
            .iter()
            .map(|&(x, y)| store.add_vertex(Point3::new(x, y, 0.0)))
            .collect();
        let mut line = |a: usize, b: usize, id: u32| {
            let pa = Point3::new(pts[a].0, pts[a].1, 0.0);
            let pb = Point3::new(pts[b].0, pts[b].1, 0.0);
            let curve = Line::new(pa, pb - pa).unwrap();
            store.add_edge(EdgeData {
                start: v[a],
                end: v[b],
                curve: EdgeCurve::Curve(CurveGeometry::Line(curve)),
                t_start: 0.0,
                t_end: (pb - pa).norm(),
                source_id: id,
            })
        };
        let e01 = line(0, 1, 10);
        let e14 = line(1, 4, 11);
        let e45 = line(4, 5, 12);
        let e50 = line(5, 0, 13);
        let e12 = line(1, 2, 14);
        let e23 = line(2, 3, 15);
        let e34 = line(3, 4, 16);

        let plane = || {
            FaceSurface::Surface(SurfaceGeometry::Plane(
                Plane::new(Frame::at_origin(Point3::origin())),
            ))
        };
        let oe = |edge, forward| OrientedEdge { edge, forward };
        let left = store.add_wire(vec![oe(e01, true), oe(e14, true), oe(e45, true), oe(e50, true)]);
        let right = store.add_wire(vec![oe(e12, true), oe(e23, true), oe(e34, true), oe(e14, false)]);
        let f0 = store.add_face(FaceData {
            surface: plane(),
            outer_wire: Some(left),
            inner_wires: Vec::new(),
            same_sense: true,
            source_id: 1,
        });
        let f1 = store.add_face(FaceData {
            surface: plane(),
            outer_wire: Some(right),
            inner_wires: Vec::new(),
            same_sense: true,
            source_id: 2,
        });
        let shell = store.add_shell(vec![f0, f1]);
        Solid::assemble(store, &Root::Shells(vec![shell])).unwrap()
    }

    #[test]
    fn numbering_follows_traversal() {
        let solid = two_squares();
        assert_eq!(solid.num_faces(), 2);
        assert_eq!(solid.num_edges(), 7);
        assert_eq!(solid.num_vertices(), 6);
        let ids: Vec<u32> = solid.edges().map(|e| e.source_id()).collect();
        assert_eq!(ids, vec![10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(solid.vertex_point(2), Some(Point3::new(1.0, 1.0, 0.0)));
        assert_eq!(solid.vertex_point(6), None);
    }

    #[test]
    fn shared_edge_lists_both_faces() {
        let solid = two_squares();
        let shared = solid.edge(1).unwrap();
        assert_eq!(shared.faces(), &[0, 1]);
        assert_eq!(solid.edge(0).unwrap().faces(), &[0]);
        assert!((shared.start_point() - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((shared.end_point() - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn loops_keep_orientation() {
        let solid = two_squares();
        let face = solid.face(1).unwrap();
        assert_eq!(face.kind(), SurfaceKind::Plane);
        let last = face.loops()[0][3];
        assert_eq!(last, LoopEdge { edge: 1, forward: false });
    }

    #[test]
    fn missing_root_is_an_error() {
        let mut other = TopologyStore::new();
        let shell = other.add_shell(Vec::new());
        let r = Solid::assemble(TopologyStore::new(), &Root::Shells(vec![shell]));
        assert!(matches!(r, Err(TopologyError::EntityNotFound(_))));
    }
}
