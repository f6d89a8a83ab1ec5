use crate::geometry::surface::{SurfaceGeometry, SurfaceKind};

use super::WireId;

slotmap::new_key_type! {
    /// Unique identifier for a face in the topology store.
    pub struct FaceId;
}

/// The geometric surface associated with a face.
#[derive(Debug, Clone)]
pub enum FaceSurface {
    /// A supported parametric surface.
    Surface(SurfaceGeometry),
    /// A surface that could not be built, with the reason.
    Unsupported(String),
}

impl FaceSurface {
    /// Returns the type tag of the surface.
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Self::Surface(s) => s.kind(),
            Self::Unsupported(_) => SurfaceKind::Unsupported,
        }
    }
}

/// Data associated with a topological face.
///
/// A face is a bounded region on a surface, defined by an outer wire
/// and optionally inner wires (holes). Wires are stored already oriented
/// for the face.
#[derive(Debug, Clone)]
pub struct FaceData {
    /// The geometric surface on which this face lies.
    pub surface: FaceSurface,
    /// The outer boundary wire, when the face has one.
    pub outer_wire: Option<WireId>,
    /// Inner boundary wires (holes).
    pub inner_wires: Vec<WireId>,
    /// If `true`, the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Entity id in the source file.
    pub source_id: u32,
}

impl FaceData {
    /// All boundary wires, outer first.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.outer_wire.into_iter().chain(self.inner_wires.iter().copied())
    }
}
