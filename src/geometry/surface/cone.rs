use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// Circular cone around the frame's `z` axis.
///
/// `radius` is the radius at the frame origin and `v` the height along `z`,
/// so `P(u, v) = o + (radius + v tan(a)) (cos u x + sin u y) + v z`. The
/// apex sits at `v = -radius / tan(a)`.
#[derive(Debug, Clone)]
pub struct Cone {
    frame: Frame,
    radius: f64,
    half_angle: f64,
}

impl Cone {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for a negative radius or a
    /// half-angle outside `(0, pi/2)`.
    pub fn new(frame: Frame, radius: f64, half_angle: f64) -> Result<Self> {
        if radius.is_nan() || radius < 0.0 {
            return Err(GeometryError::Degenerate(format!("cone radius {radius}")).into());
        }
        if half_angle.is_nan() || half_angle <= TOLERANCE || half_angle >= FRAC_PI_2 - TOLERANCE {
            return Err(GeometryError::Degenerate(format!("cone half-angle {half_angle}")).into());
        }
        Ok(Self {
            frame,
            radius,
            half_angle,
        })
    }

    /// Point where the cone closes.
    #[must_use]
    pub fn apex(&self) -> Point3 {
        self.frame.origin - self.frame.z * (self.radius / self.half_angle.tan())
    }

    /// Angle between the axis and the generating lines.
    #[must_use]
    pub fn half_angle(&self) -> f64 {
        self.half_angle
    }

    fn radius_at(&self, v: f64) -> f64 {
        self.radius + v * self.half_angle.tan()
    }
}

impl Surface for Cone {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.frame.origin + self.frame.radial(u) * self.radius_at(v) + self.frame.z * v)
    }

    /// Points away from the axis; past the apex the sheet flips and so
    /// does the normal.
    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        let r = self.radius_at(v);
        if r.abs() < TOLERANCE {
            return Err(GeometryError::Degenerate("cone normal at apex".into()).into());
        }
        let (s, c) = self.half_angle.sin_cos();
        Ok((self.frame.radial(u) * c - self.frame.z * s) * r.signum())
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    /// Foot of the perpendicular onto the generator through the point's
    /// angle.
    fn project(&self, point: &Point3) -> (f64, f64) {
        let (u, rho, h) = self.frame.cylindrical(point);
        let (s, c) = self.half_angle.sin_cos();
        let v = ((rho - self.radius) * s / c + h) * c * c;
        (u, v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn cone() -> Cone {
        Cone::new(Frame::at_origin(Point3::new(0.0, 0.0, 1.0)), 1.0, FRAC_PI_4).unwrap()
    }

    #[test]
    fn radius_grows_along_axis() {
        let c = cone();
        assert!((c.apex() - Point3::origin()).norm() < 1e-12);
        let p = c.evaluate(0.0, 1.0).unwrap();
        assert!((p - Point3::new(2.0, 0.0, 2.0)).norm() < 1e-12);
        let n = c.normal(0.0, 1.0).unwrap();
        let expected = Vector3::new(1.0, 0.0, -1.0).normalize();
        assert!((n - expected).norm() < 1e-12);
    }

    #[test]
    fn normal_undefined_at_apex() {
        assert!(cone().normal(0.3, -1.0).is_err());
    }

    #[test]
    fn projection_onto_generator() {
        let c = cone();
        let p = c.evaluate(1.2, 0.7).unwrap() + c.normal(1.2, 0.7).unwrap() * 0.25;
        let (u, v) = c.project(&p);
        assert!((u - 1.2).abs() < 1e-12);
        assert!((v - 0.7).abs() < 1e-12);
    }

    #[test]
    fn half_angle_bounds() {
        let f = Frame::at_origin(Point3::origin());
        assert!(Cone::new(f, 1.0, 0.0).is_err());
        assert!(Cone::new(f, 1.0, FRAC_PI_2).is_err());
        assert!(Cone::new(f, -1.0, 0.5).is_err());
    }
}
