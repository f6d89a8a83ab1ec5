use crate::geometry::curve::CurveGeometry;

use super::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for an edge in the topology store.
    pub struct EdgeId;
}

/// The geometric curve associated with an edge.
#[derive(Debug, Clone)]
pub enum EdgeCurve {
    /// A supported parametric curve.
    Curve(CurveGeometry),
    /// A curve type the kernel cannot evaluate, with its entity name.
    Unsupported(String),
}

impl EdgeCurve {
    /// Returns the evaluable curve, if any.
    #[must_use]
    pub fn geometry(&self) -> Option<&CurveGeometry> {
        match self {
            Self::Curve(c) => Some(c),
            Self::Unsupported(_) => None,
        }
    }
}

/// Data associated with a topological edge.
///
/// An edge connects two vertices and carries a geometric curve
/// that defines the shape of the edge between them.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Start vertex of the edge.
    pub start: VertexId,
    /// End vertex of the edge.
    pub end: VertexId,
    /// The geometric curve defining this edge's shape.
    pub curve: EdgeCurve,
    /// Parameter on the curve corresponding to the start vertex.
    pub t_start: f64,
    /// Parameter on the curve corresponding to the end vertex.
    pub t_end: f64,
    /// Entity id in the source file.
    pub source_id: u32,
}
