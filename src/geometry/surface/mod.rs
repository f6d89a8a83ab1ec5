mod bspline;
mod cone;
mod cylinder;
mod extrusion;
mod plane;
mod revolution;
mod sphere;
mod torus;

pub use bspline::BSplineSurface;
pub use cone::Cone;
pub use cylinder::Cylinder;
pub use extrusion::Extrusion;
pub use plane::Plane;
pub use revolution::Revolution;
pub use sphere::Sphere;
pub use torus::Torus;

use serde::Serialize;

use crate::error::Result;
use crate::math::minimize::minimize_2d;
use crate::math::{Point3, Vector3};

/// Parameter domain for a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDomain {
    /// Start of the U parameter range.
    pub u_min: f64,
    /// End of the U parameter range.
    pub u_max: f64,
    /// Start of the V parameter range.
    pub v_min: f64,
    /// End of the V parameter range.
    pub v_max: f64,
}

impl SurfaceDomain {
    /// Creates a new surface domain.
    #[must_use]
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// Returns `true` when all four bounds are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.u_min.is_finite()
            && self.u_max.is_finite()
            && self.v_min.is_finite()
            && self.v_max.is_finite()
    }

    /// Clamps `(u, v)` into the domain.
    #[must_use]
    pub fn clamp(&self, u: f64, v: f64) -> (f64, f64) {
        (u.clamp(self.u_min, self.u_max), v.clamp(self.v_min, self.v_max))
    }
}

/// Trait for parametric surfaces in 3D space.
pub trait Surface {
    /// Evaluates the surface at parameters `(u, v)`, returning the 3D point.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are out of range or evaluation fails.
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3>;

    /// Computes the unit surface normal at parameters `(u, v)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are out of range or the normal is degenerate.
    fn normal(&self, u: f64, v: f64) -> Result<Vector3>;

    /// Returns the parameter domain of the surface.
    fn domain(&self) -> SurfaceDomain;

    /// Period of the U parameter, if the surface is closed in U.
    fn u_period(&self) -> Option<f64> {
        None
    }

    /// Period of the V parameter, if the surface is closed in V.
    fn v_period(&self) -> Option<f64> {
        None
    }

    /// Returns the parameters of the surface point closest to `point`.
    ///
    /// Periodic parameters are reported in their base period.
    fn project(&self, point: &Point3) -> (f64, f64);
}

/// Closest-point search over a finite surface domain.
pub(crate) fn project_by_search<S: Surface + ?Sized>(surface: &S, point: &Point3, samples: usize) -> (f64, f64) {
    let d = surface.domain();
    minimize_2d(
        |u, v| {
            surface
                .evaluate(u, v)
                .map_or(f64::INFINITY, |p| (p - point).norm_squared())
        },
        (d.u_min, d.u_max),
        (d.v_min, d.v_max),
        samples,
    )
}

/// Surface type tag carried into graphs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Plane,
    Cylinder,
    Cone,
    Sphere,
    Torus,
    BSpline,
    Extrusion,
    Revolution,
    Unsupported,
}

impl SurfaceKind {
    /// Stable numeric code, used in canonical graph bytes.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Plane => 0,
            Self::Cylinder => 1,
            Self::Cone => 2,
            Self::Sphere => 3,
            Self::Torus => 4,
            Self::BSpline => 5,
            Self::Extrusion => 6,
            Self::Revolution => 7,
            Self::Unsupported => 255,
        }
    }
}

/// The closed set of surface types a face can lie on.
#[derive(Debug, Clone)]
pub enum SurfaceGeometry {
    Plane(Plane),
    Cylinder(Cylinder),
    Cone(Cone),
    Sphere(Sphere),
    Torus(Torus),
    BSpline(BSplineSurface),
    Extrusion(Extrusion),
    Revolution(Revolution),
}

impl SurfaceGeometry {
    /// Returns the type tag of this surface.
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Self::Plane(_) => SurfaceKind::Plane,
            Self::Cylinder(_) => SurfaceKind::Cylinder,
            Self::Cone(_) => SurfaceKind::Cone,
            Self::Sphere(_) => SurfaceKind::Sphere,
            Self::Torus(_) => SurfaceKind::Torus,
            Self::BSpline(_) => SurfaceKind::BSpline,
            Self::Extrusion(_) => SurfaceKind::Extrusion,
            Self::Revolution(_) => SurfaceKind::Revolution,
        }
    }

    fn as_surface(&self) -> &dyn Surface {
        match self {
            Self::Plane(s) => s,
            Self::Cylinder(s) => s,
            Self::Cone(s) => s,
            Self::Sphere(s) => s,
            Self::Torus(s) => s,
            Self::BSpline(s) => s,
            Self::Extrusion(s) => s,
            Self::Revolution(s) => s,
        }
    }
}

impl Surface for SurfaceGeometry {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        self.as_surface().evaluate(u, v)
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        self.as_surface().normal(u, v)
    }

    fn domain(&self) -> SurfaceDomain {
        self.as_surface().domain()
    }

    fn u_period(&self) -> Option<f64> {
        self.as_surface().u_period()
    }

    fn v_period(&self) -> Option<f64> {
        self.as_surface().v_period()
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        self.as_surface().project(point)
    }
}
