use std::f64::consts::TAU;

use nalgebra::{Unit, UnitQuaternion};

use crate::error::{GeometryError, Result};
use crate::geometry::curve::{Curve, CurveGeometry};
use crate::math::minimize::minimize_1d;
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A surface swept by rotating a profile curve about an axis.
///
/// `P(u, v) = origin + R(axis, u) * (C(v) - origin)`; `u` is the rotation
/// angle and `v` the profile parameter.
#[derive(Debug, Clone)]
pub struct Revolution {
    profile: Box<CurveGeometry>,
    origin: Point3,
    axis: Unit<Vector3>,
}

impl Revolution {
    /// Creates a surface of revolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is zero-length.
    pub fn new(profile: CurveGeometry, origin: Point3, axis: Vector3) -> Result<Self> {
        if axis.norm() < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            profile: Box::new(profile),
            origin,
            axis: Unit::new_normalize(axis),
        })
    }

    fn rotate(&self, u: f64, v: &Vector3) -> Vector3 {
        UnitQuaternion::from_axis_angle(&self.axis, u) * v
    }

    /// Height along the axis and radius from it.
    fn cylindrical(&self, p: &Point3) -> (f64, f64, Vector3) {
        let dp = p - self.origin;
        let h = dp.dot(&self.axis);
        let radial = dp - self.axis.into_inner() * h;
        (h, radial.norm(), radial)
    }
}

impl Surface for Revolution {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        let c = self.profile.evaluate(v)?;
        Ok(self.origin + self.rotate(u, &(c - self.origin)))
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        let p = self.evaluate(u, v)?;
        let du = self.axis.cross(&(p - self.origin));
        let dv = self.rotate(u, &self.profile.tangent(v)?);
        let n = du.cross(&dv);
        let len = n.norm();
        if len < TOLERANCE {
            return Err(GeometryError::Degenerate(
                "surface of revolution normal vanishes on the axis".into(),
            )
            .into());
        }
        Ok(n / len)
    }

    fn domain(&self) -> SurfaceDomain {
        let d = self.profile.domain();
        SurfaceDomain::new(0.0, TAU, d.t_min, d.t_max)
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn v_period(&self) -> Option<f64> {
        self.profile.period()
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let (h, r, radial) = self.cylindrical(point);
        let d = self.profile.domain();
        let v = if d.is_finite() {
            minimize_1d(
                |t| {
                    self.profile.evaluate(t).map_or(f64::INFINITY, |c| {
                        let (hc, rc, _) = self.cylindrical(&c);
                        (hc - h).powi(2) + (rc - r).powi(2)
                    })
                },
                d.t_min,
                d.t_max,
                96,
            )
        } else {
            self.profile.project(point)
        };
        let u = match self.profile.evaluate(v) {
            Ok(c) => {
                let (_, _, profile_radial) = self.cylindrical(&c);
                let cross = profile_radial.cross(&radial).dot(&self.axis);
                cross.atan2(profile_radial.dot(&radial)).rem_euclid(TAU)
            }
            Err(_) => 0.0,
        };
        (u, v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::Line;
    use std::f64::consts::FRAC_PI_2;

    /// Cylinder of radius 1 around z made by revolving a vertical line.
    fn revolved_line() -> Revolution {
        let line = Line::new(Point3::new(1.0, 0.0, 0.0), Vector3::z()).unwrap();
        Revolution::new(CurveGeometry::Line(line), Point3::origin(), Vector3::z()).unwrap()
    }

    #[test]
    fn rotates_profile() {
        let s = revolved_line();
        let p = s.evaluate(FRAC_PI_2, 2.0).unwrap();
        assert!((p - Point3::new(0.0, 1.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn normal_points_away_from_axis() {
        let s = revolved_line();
        let n = s.normal(0.0, 0.0).unwrap();
        assert!((n.abs() - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn project_recovers_angle_and_height() {
        let s = revolved_line();
        let (u, v) = s.project(&Point3::new(0.0, -1.0, 0.5));
        assert!((u - 3.0 * FRAC_PI_2).abs() < 1e-9);
        assert!((v - 0.5).abs() < 1e-9);
    }
}
