pub mod curve;
pub mod nurbs;
pub mod surface;

pub use curve::{Curve, CurveDomain, CurveGeometry};
pub use surface::{Surface, SurfaceDomain, SurfaceGeometry, SurfaceKind};
