mod bspline;
mod circle;
mod ellipse;
mod line;
mod polyline;

pub use bspline::BSplineCurve;
pub use circle::Circle;
pub use ellipse::Ellipse;
pub use line::Line;
pub use polyline::Polyline;

use crate::error::Result;
use crate::math::minimize::minimize_1d;
use crate::math::{Point3, Vector3};

/// Parameter domain for a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveDomain {
    /// Start of the parameter range.
    pub t_min: f64,
    /// End of the parameter range.
    pub t_max: f64,
}

impl CurveDomain {
    /// Creates a new curve domain.
    #[must_use]
    pub fn new(t_min: f64, t_max: f64) -> Self {
        Self { t_min, t_max }
    }

    /// Returns `true` when both ends of the range are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.t_min.is_finite() && self.t_max.is_finite()
    }

    /// Clamps `t` into the domain.
    #[must_use]
    pub fn clamp(&self, t: f64) -> f64 {
        t.clamp(self.t_min, self.t_max)
    }
}

/// Trait for parametric curves in 3D space.
pub trait Curve {
    /// Evaluates the curve at parameter `t`, returning the 3D point.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is out of range or evaluation fails.
    fn evaluate(&self, t: f64) -> Result<Point3>;

    /// Computes the unit tangent vector at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is out of range or the tangent is degenerate.
    fn tangent(&self, t: f64) -> Result<Vector3>;

    /// Returns the parameter domain of the curve.
    fn domain(&self) -> CurveDomain;

    /// Returns whether the curve is closed.
    fn is_closed(&self) -> bool;

    /// Returns the parameter period for periodic curves.
    fn period(&self) -> Option<f64> {
        None
    }

    /// Returns the parameter of the curve point closest to `point`.
    fn project(&self, point: &Point3) -> f64;
}

/// Closest-point search over a finite curve domain.
pub(crate) fn project_by_search<C: Curve + ?Sized>(curve: &C, point: &Point3, samples: usize) -> f64 {
    let domain = curve.domain();
    minimize_1d(
        |t| {
            curve
                .evaluate(t)
                .map_or(f64::INFINITY, |p| (p - point).norm_squared())
        },
        domain.t_min,
        domain.t_max,
        samples,
    )
}

/// The closed set of curve types an edge can carry.
#[derive(Debug, Clone)]
pub enum CurveGeometry {
    /// An infinite line.
    Line(Line),
    /// A full circle.
    Circle(Circle),
    /// An ellipse.
    Ellipse(Ellipse),
    /// A (possibly rational) B-spline curve.
    BSpline(BSplineCurve),
    /// A piecewise-linear curve.
    Polyline(Polyline),
}

impl CurveGeometry {
    /// Short type name used in logs and reports.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Line(_) => "line",
            Self::Circle(_) => "circle",
            Self::Ellipse(_) => "ellipse",
            Self::BSpline(_) => "bspline",
            Self::Polyline(_) => "polyline",
        }
    }

    fn as_curve(&self) -> &dyn Curve {
        match self {
            Self::Line(c) => c,
            Self::Circle(c) => c,
            Self::Ellipse(c) => c,
            Self::BSpline(c) => c,
            Self::Polyline(c) => c,
        }
    }
}

impl Curve for CurveGeometry {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        self.as_curve().evaluate(t)
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        self.as_curve().tangent(t)
    }

    fn domain(&self) -> CurveDomain {
        self.as_curve().domain()
    }

    fn is_closed(&self) -> bool {
        self.as_curve().is_closed()
    }

    fn period(&self) -> Option<f64> {
        self.as_curve().period()
    }

    fn project(&self, point: &Point3) -> f64 {
        self.as_curve().project(point)
    }
}
