use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// Circle in the `x`/`y` plane of its frame, `P(t) = o + r (cos t x + sin t y)`.
#[derive(Debug, Clone)]
pub struct Circle {
    frame: Frame,
    radius: f64,
}

impl Circle {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for a radius that is not positive.
    pub fn new(frame: Frame, radius: f64) -> Result<Self> {
        if radius.is_nan() || radius <= TOLERANCE {
            return Err(GeometryError::Degenerate(format!("circle radius {radius}")).into());
        }
        Ok(Self { frame, radius })
    }
}

impl Curve for Circle {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.frame.origin + self.frame.radial(t) * self.radius)
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        Ok(self.frame.tangential(t))
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

    fn project(&self, point: &Point3) -> f64 {
        self.frame.cylindrical(point).0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn tilted() -> Circle {
        let frame = Frame::new(Point3::new(0.0, 0.0, 5.0), Vector3::x(), Vector3::y()).unwrap();
        Circle::new(frame, 2.0).unwrap()
    }

    #[test]
    fn follows_frame_axes() {
        let c = tilted();
        let p = c.evaluate(FRAC_PI_2).unwrap();
        // y of a frame with z = x and x = y is the world z axis.
        assert!((p - Point3::new(0.0, 0.0, 7.0)).norm() < 1e-12);
        assert!((c.tangent(0.0).unwrap() - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn projection_ignores_distance_from_plane() {
        let c = tilted();
        let t = c.project(&Point3::new(9.0, -3.0, 5.0));
        assert!((t - FRAC_PI_2 * 2.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_radius_rejected() {
        let f = Frame::at_origin(Point3::origin());
        assert!(Circle::new(f, 0.0).is_err());
        assert!(Circle::new(f, f64::NAN).is_err());
    }
}
