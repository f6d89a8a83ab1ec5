use crate::error::{GeometryError, Result};
use crate::geometry::curve::{Curve, CurveGeometry};
use crate::math::minimize::minimize_1d;
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A surface swept by translating a profile curve along a vector.
///
/// `P(u, v) = C(u) + v * sweep`, where `sweep` keeps its magnitude so that
/// `v` counts multiples of the sweep vector.
#[derive(Debug, Clone)]
pub struct Extrusion {
    profile: Box<CurveGeometry>,
    sweep: Vector3,
}

impl Extrusion {
    /// Creates an extrusion of `profile` along `sweep`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep vector is zero-length.
    pub fn new(profile: CurveGeometry, sweep: Vector3) -> Result<Self> {
        if sweep.norm() < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            profile: Box::new(profile),
            sweep,
        })
    }

    /// Returns the profile curve.
    #[must_use]
    pub fn profile(&self) -> &CurveGeometry {
        &self.profile
    }
}

impl Surface for Extrusion {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.profile.evaluate(u)? + self.sweep * v)
    }

    fn normal(&self, u: f64, _v: f64) -> Result<Vector3> {
        let n = self.profile.tangent(u)?.cross(&self.sweep);
        let len = n.norm();
        if len < TOLERANCE {
            return Err(GeometryError::Degenerate(
                "profile tangent is parallel to the sweep".into(),
            )
            .into());
        }
        Ok(n / len)
    }

    fn domain(&self) -> SurfaceDomain {
        let d = self.profile.domain();
        SurfaceDomain::new(d.t_min, d.t_max, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn u_period(&self) -> Option<f64> {
        self.profile.period()
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let axis = self.sweep.normalize();
        let flatten = |p: Point3| p - axis * (p.coords.dot(&axis));
        let target = flatten(*point);
        let d = self.profile.domain();
        let u = if d.is_finite() {
            minimize_1d(
                |t| {
                    self.profile
                        .evaluate(t)
                        .map_or(f64::INFINITY, |c| (flatten(c) - target).norm_squared())
                },
                d.t_min,
                d.t_max,
                96,
            )
        } else {
            self.profile.project(point)
        };
        let base = self.profile.evaluate(u).unwrap_or(*point);
        let v = (point - base).dot(&self.sweep) / self.sweep.norm_squared();
        (u, v)
    }
}
