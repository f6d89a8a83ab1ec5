use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// Ellipse with its major axis along the frame's `x`.
#[derive(Debug, Clone)]
pub struct Ellipse {
    frame: Frame,
    semi_major: f64,
    semi_minor: f64,
}

impl Ellipse {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] unless both semi-axes are
    /// positive.
    pub fn new(frame: Frame, semi_major: f64, semi_minor: f64) -> Result<Self> {
        if semi_major.is_nan() || semi_minor.is_nan() || semi_major.min(semi_minor) <= TOLERANCE {
            return Err(GeometryError::Degenerate(format!("ellipse semi-axes {semi_major}, {semi_minor}")).into());
        }
        Ok(Self {
            frame,
            semi_major,
            semi_minor,
        })
    }

    fn derivative(&self, t: f64) -> Vector3 {
        self.frame.y * (self.semi_minor * t.cos()) - self.frame.x * (self.semi_major * t.sin())
    }
}

impl Curve for Ellipse {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.frame.point(self.semi_major * t.cos(), self.semi_minor * t.sin(), 0.0))
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        Ok(self.derivative(t).normalize())
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(0.0, TAU)
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn period(&self) -> Option<f64> {
        Some(TAU)
    }

    /// Starts from the eccentric angle of the point scaled onto a circle and
    /// refines with Newton steps on the squared distance.
    fn project(&self, point: &Point3) -> f64 {
        let l = self.frame.local(point);
        let mut t = (l.y / self.semi_minor).atan2(l.x / self.semi_major);
        for _ in 0..8 {
            let (s, c) = t.sin_cos();
            let d = Vector3::new(self.semi_major * c - l.x, self.semi_minor * s - l.y, 0.0);
            let d1 = Vector3::new(-self.semi_major * s, self.semi_minor * c, 0.0);
            let d2 = Vector3::new(-self.semi_major * c, -self.semi_minor * s, 0.0);
            let g = d.dot(&d1);
            let h = d1.dot(&d1) + d.dot(&d2);
            if h.abs() < TOLERANCE {
                break;
            }
            let step = g / h;
            t -= step;
            if step.abs() < 1e-14 {
                break;
            }
        }
        t.rem_euclid(TAU)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn flat() -> Ellipse {
        Ellipse::new(Frame::at_origin(Point3::origin()), 3.0, 1.0).unwrap()
    }

    #[test]
    fn axes_follow_frame() {
        let e = flat();
        assert!((e.evaluate(0.0).unwrap() - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((e.evaluate(FRAC_PI_2).unwrap() - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((e.tangent(0.0).unwrap() - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn projection_recovers_curve_points() {
        let e = flat();
        for t in [0.3, 2.0, 4.5] {
            let p = e.evaluate(t).unwrap();
            assert!((e.project(&p) - t).abs() < 1e-9);
        }
    }

    #[test]
    fn collapsed_axis_rejected() {
        assert!(Ellipse::new(Frame::at_origin(Point3::origin()), 2.0, 0.0).is_err());
    }
}
