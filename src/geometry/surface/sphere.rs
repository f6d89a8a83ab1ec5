use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// Sphere centred on the frame origin.
///
/// `u` is the longitude from `x`, `v` the latitude in `[-pi/2, pi/2]`
/// measured towards `z`.
#[derive(Debug, Clone)]
pub struct Sphere {
    frame: Frame,
    radius: f64,
}

impl Sphere {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for a radius that is not positive.
    pub fn new(frame: Frame, radius: f64) -> Result<Self> {
        if radius.is_nan() || radius <= TOLERANCE {
            return Err(GeometryError::Degenerate(format!("sphere radius {radius}")).into());
        }
        Ok(Self { frame, radius })
    }

    fn direction(&self, u: f64, v: f64) -> Vector3 {
        self.frame.radial(u) * v.cos() + self.frame.z * v.sin()
    }
}

impl Surface for Sphere {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.frame.origin + self.direction(u, v) * self.radius)
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        Ok(self.direction(u, v))
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, -FRAC_PI_2, FRAC_PI_2)
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let (u, rho, h) = self.frame.cylindrical(point);
        (u, h.atan2(rho))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sphere() -> Sphere {
        Sphere::new(Frame::at_origin(Point3::new(0.0, 0.0, 1.0)), 2.0).unwrap()
    }

    #[test]
    fn poles_and_equator() {
        let s = sphere();
        assert!((s.evaluate(1.0, FRAC_PI_2).unwrap() - Point3::new(0.0, 0.0, 3.0)).norm() < 1e-12);
        assert!((s.evaluate(0.0, 0.0).unwrap() - Point3::new(2.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((s.normal(0.0, -FRAC_PI_2).unwrap() + Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn projection_recovers_latitude() {
        let s = sphere();
        let p = s.evaluate(2.5, -0.4).unwrap();
        let (u, v) = s.project(&p);
        assert!((u - 2.5).abs() < 1e-12);
        assert!((v + 0.4).abs() < 1e-12);
    }

    #[test]
    fn zero_radius_rejected() {
        assert!(Sphere::new(Frame::at_origin(Point3::origin()), 0.0).is_err());
    }
}
