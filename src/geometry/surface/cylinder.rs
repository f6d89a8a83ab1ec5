use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// Circular cylinder around the frame's `z` axis.
///
/// `u` is the angle from `x`, `v` the height along `z`; normals point away
/// from the axis.
#[derive(Debug, Clone)]
pub struct Cylinder {
    frame: Frame,
    radius: f64,
}

impl Cylinder {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for a radius that is not positive.
    pub fn new(frame: Frame, radius: f64) -> Result<Self> {
        if radius.is_nan() || radius <= TOLERANCE {
            return Err(GeometryError::Degenerate(format!("cylinder radius {radius}")).into());
        }
        Ok(Self { frame, radius })
    }
}

impl Surface for Cylinder {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.frame.origin + self.frame.radial(u) * self.radius + self.frame.z * v)
    }

    fn normal(&self, u: f64, _v: f64) -> Result<Vector3> {
        Ok(self.frame.radial(u))
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let (u, _, v) = self.frame.cylindrical(point);
        (u, v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn height_runs_along_axis() {
        let frame = Frame::new(Point3::new(1.0, 0.0, 0.0), Vector3::x(), Vector3::z()).unwrap();
        let c = Cylinder::new(frame, 2.0).unwrap();
        let p = c.evaluate(0.0, 3.0).unwrap();
        assert!((p - Point3::new(4.0, 0.0, 2.0)).norm() < 1e-12);
        assert!((c.normal(0.0, 3.0).unwrap() - Vector3::z()).norm() < 1e-12);
        let (u, v) = c.project(&Point3::new(-5.0, 0.0, -7.0));
        assert!((u - PI).abs() < 1e-12);
        assert!((v + 6.0).abs() < 1e-12);
    }

    #[test]
    fn zero_radius_rejected() {
        assert!(Cylinder::new(Frame::at_origin(Point3::origin()), 0.0).is_err());
    }
}
