//! Topology construction: STEP shells, faces, loops and edges into a
//! [`TopologyStore`], rooted for [`Solid::assemble`].

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::GeometryLoadError;
use crate::geometry::curve::Curve;
use crate::math::Point3;
use crate::topology::{
    EdgeCurve, EdgeData, EdgeId, FaceData, FaceId, OrientedEdge, Root, ShellId, Solid, SolidData,
    TopologyStore, VertexId, WireId,
};

use super::decode::Decoder;
use super::entity::{Args, EntityTable};

const SOLIDS: [&str; 2] = ["MANIFOLD_SOLID_BREP", "BREP_WITH_VOIDS"];
const SURFACE_MODELS: [&str; 1] = ["SHELL_BASED_SURFACE_MODEL"];
const SHELLS: [&str; 2] = ["CLOSED_SHELL", "OPEN_SHELL"];
const FACES: [&str; 2] = ["ADVANCED_FACE", "FACE_SURFACE"];

/// Builds the solid described by `table`.
///
/// # Errors
///
/// Returns an error when a required reference is missing or of the wrong
/// type, or when no face is reachable.
pub fn build_solid(table: &EntityTable<'_>) -> Result<Solid, GeometryLoadError> {
    let mut builder = Builder::new(table);
    let root = builder.root()?;
    let solid = Solid::assemble(builder.store, &root)?;
    if solid.num_faces() == 0 {
        return Err(GeometryLoadError::NoFaces);
    }
    debug!(
        faces = solid.num_faces(),
        edges = solid.num_edges(),
        vertices = solid.num_vertices(),
        "assembled solid"
    );
    Ok(solid)
}

struct Builder<'t, 'a> {
    table: &'t EntityTable<'a>,
    decoder: Decoder<'t, 'a>,
    store: TopologyStore,
    vertices: FxHashMap<u32, VertexId>,
    edges: FxHashMap<u32, EdgeId>,
    faces: FxHashMap<u32, FaceId>,
    shells: FxHashMap<u32, ShellId>,
}

impl<'t, 'a> Builder<'t, 'a> {
    fn new(table: &'t EntityTable<'a>) -> Self {
        Self {
            table,
            decoder: Decoder::new(table),
            store: TopologyStore::new(),
            vertices: FxHashMap::default(),
            edges: FxHashMap::default(),
            faces: FxHashMap::default(),
            shells: FxHashMap::default(),
        }
    }

    fn root(&mut self) -> Result<Root, GeometryLoadError> {
        let solids = self.table.ids_of(&SOLIDS);
        if let Some(&id) = solids.first() {
            if solids.len() > 1 {
                warn!(count = solids.len(), chosen = id, "file holds several solids, using the first");
            }
            return self.solid(id).map(Root::Solid);
        }

        if let Some(&id) = self.table.ids_of(&SURFACE_MODELS).first() {
            let args = Args::of(self.table.get(id, 0)?, "SHELL_BASED_SURFACE_MODEL")?;
            let shells = args
                .references(1)?
                .into_iter()
                .map(|s| self.shell(s, id))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Root::Shells(shells));
        }

        let shell_ids = self.table.ids_of(&SHELLS);
        if !shell_ids.is_empty() {
            if shell_ids.len() > 1 {
                debug!(count = shell_ids.len(), "joining loose shells in id order");
            }
            let shells = shell_ids
                .into_iter()
                .map(|s| self.shell(s, 0))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Root::Shells(shells));
        }

        let faces = self
            .table
            .ids_of(&FACES)
            .into_iter()
            .map(|f| self.face(f, 0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Root::Faces(faces))
    }

    fn solid(&mut self, id: u32) -> Result<crate::topology::SolidId, GeometryLoadError> {
        let entity = self.table.get(id, 0)?;
        let args = Args::any(entity);
        let outer_shell = self.shell(args.reference(1)?, id)?;
        let mut inner_shells = Vec::new();
        if args.name() == "BREP_WITH_VOIDS" {
            for void in args.references(2)? {
                inner_shells.push(self.shell(void, id)?);
            }
        }
        Ok(self.store.add_solid(SolidData {
            outer_shell,
            inner_shells,
        }))
    }

    fn shell(&mut self, id: u32, referenced_by: u32) -> Result<ShellId, GeometryLoadError> {
        if let Some(&shell) = self.shells.get(&id) {
            return Ok(shell);
        }
        let entity = self.table.get(id, referenced_by)?;
        let args = Args::any(entity);
        let face_list = match args.name() {
            "CLOSED_SHELL" => args.references(1)?,
            "OPEN_SHELL" => {
                debug!(id, "open shell");
                args.references(1)?
            }
            // ORIENTED_CLOSED_SHELL(name, *, shell, orientation)
            "ORIENTED_CLOSED_SHELL" | "ORIENTED_OPEN_SHELL" => {
                return self.shell(args.reference(2)?, id);
            }
            other => {
                return Err(GeometryLoadError::UnexpectedEntity {
                    id,
                    expected: "CLOSED_SHELL",
                    found: other.to_string(),
                })
            }
        };
        let mut faces = Vec::with_capacity(face_list.len());
        for face in face_list {
            faces.push(self.face(face, id)?);
        }
        let shell = self.store.add_shell(faces);
        self.shells.insert(id, shell);
        Ok(shell)
    }

    fn face(&mut self, id: u32, referenced_by: u32) -> Result<FaceId, GeometryLoadError> {
        if let Some(&face) = self.faces.get(&id) {
            return Ok(face);
        }
        let entity = self.table.get(id, referenced_by)?;
        let args = Args::any(entity);
        match args.name() {
            "ADVANCED_FACE" | "FACE_SURFACE" => {}
            // ORIENTED_FACE(name, *, face, orientation)
            "ORIENTED_FACE" => return self.face(args.reference(2)?, id),
            other => {
                return Err(GeometryLoadError::UnexpectedEntity {
                    id,
                    expected: "ADVANCED_FACE",
                    found: other.to_string(),
                })
            }
        }

        let surface = self.decoder.surface(args.reference(2)?, id)?;
        let same_sense = args.boolean(3)?;
        let mut outer_wire = None;
        let mut inner_wires = Vec::new();
        for bound_id in args.references(1)? {
            let bound = self.table.get(bound_id, id)?;
            let bound_args = Args::any(bound);
            let is_outer = match bound_args.name() {
                "FACE_OUTER_BOUND" => true,
                "FACE_BOUND" => false,
                other => {
                    return Err(GeometryLoadError::UnexpectedEntity {
                        id: bound_id,
                        expected: "FACE_BOUND",
                        found: other.to_string(),
                    })
                }
            };
            let orientation = bound_args.boolean(2)?;
            let Some(wire) = self.wire(bound_args.reference(1)?, bound_id, orientation)? else {
                continue;
            };
            if is_outer && outer_wire.is_none() {
                outer_wire = Some(wire);
            } else {
                inner_wires.push(wire);
            }
        }
        if outer_wire.is_none() && !inner_wires.is_empty() {
            outer_wire = Some(inner_wires.remove(0));
        }

        let face = self.store.add_face(FaceData {
            surface,
            outer_wire,
            inner_wires,
            same_sense,
            source_id: id,
        });
        self.faces.insert(id, face);
        Ok(face)
    }

    /// Builds the wire of a loop; `None` for vertex and poly loops, which
    /// carry no edges.
    fn wire(&mut self, id: u32, referenced_by: u32, orientation: bool) -> Result<Option<WireId>, GeometryLoadError> {
        let entity = self.table.get(id, referenced_by)?;
        let args = Args::any(entity);
        match args.name() {
            "EDGE_LOOP" => {}
            "VERTEX_LOOP" | "POLY_LOOP" => return Ok(None),
            other => {
                return Err(GeometryLoadError::UnexpectedEntity {
                    id,
                    expected: "EDGE_LOOP",
                    found: other.to_string(),
                })
            }
        }
        let mut edges = Vec::new();
        for oe_id in args.references(1)? {
            let oe = Args::of(self.table.get(oe_id, id)?, "ORIENTED_EDGE")?;
            let edge = self.edge(oe.reference(3)?, oe_id)?;
            edges.push(OrientedEdge {
                edge,
                forward: oe.boolean(4)?,
            });
        }
        if !orientation {
            edges.reverse();
            for oe in &mut edges {
                oe.forward = !oe.forward;
            }
        }
        Ok(Some(self.store.add_wire(edges)))
    }

    fn edge(&mut self, id: u32, referenced_by: u32) -> Result<EdgeId, GeometryLoadError> {
        if let Some(&edge) = self.edges.get(&id) {
            return Ok(edge);
        }
        let args = Args::of(self.table.get(id, referenced_by)?, "EDGE_CURVE")?;
        let (start_id, end_id) = (args.reference(1)?, args.reference(2)?);
        let (start, start_point) = self.vertex(start_id, id)?;
        let (end, end_point) = self.vertex(end_id, id)?;
        let curve = self.decoder.curve(args.reference(3)?, id)?;
        let same_sense = args.boolean(4)?;
        let (t_start, t_end) = parameter_range(&curve, &start_point, &end_point, same_sense, start_id == end_id);

        let edge = self.store.add_edge(EdgeData {
            start,
            end,
            curve,
            t_start,
            t_end,
            source_id: id,
        });
        self.edges.insert(id, edge);
        Ok(edge)
    }

    fn vertex(&mut self, id: u32, referenced_by: u32) -> Result<(VertexId, Point3), GeometryLoadError> {
        let args = Args::of(self.table.get(id, referenced_by)?, "VERTEX_POINT")?;
        let point = self.decoder.point(args.reference(1)?, id)?;
        let vertex = *self
            .vertices
            .entry(id)
            .or_insert_with(|| self.store.add_vertex(point));
        Ok((vertex, point))
    }
}

/// Curve parameters of the start and end vertex.
///
/// Periodic curves are unwrapped so that the parameter runs forward when
/// `same_sense` holds and backward otherwise; closed edges span a full
/// period. Curves without geometry get `0..1`.
fn parameter_range(curve: &EdgeCurve, start: &Point3, end: &Point3, same_sense: bool, closed: bool) -> (f64, f64) {
    let Some(geometry) = curve.geometry() else {
        return (0.0, 1.0);
    };
    let t0 = geometry.project(start);
    if closed {
        if let Some(period) = geometry.period() {
            return (t0, if same_sense { t0 + period } else { t0 - period });
        }
        let domain = geometry.domain();
        if geometry.is_closed() && domain.is_finite() {
            return if same_sense {
                (domain.t_min, domain.t_max)
            } else {
                (domain.t_max, domain.t_min)
            };
        }
        return (t0, t0);
    }
    let t1 = geometry.project(end);
    match geometry.period() {
        Some(period) if same_sense => (t0, t0 + (t1 - t0).rem_euclid(period)),
        Some(period) => (t0, t0 - (t0 - t1).rem_euclid(period)),
        None => (t0, t1),
    }
}
