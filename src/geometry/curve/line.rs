use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// Unbounded straight line, parameterized by arc length from `origin`.
#[derive(Debug, Clone)]
pub struct Line {
    origin: Point3,
    direction: Vector3,
}

impl Line {
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroVector`] for a zero direction.
    pub fn new(origin: Point3, direction: Vector3) -> Result<Self> {
        let len = direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            origin,
            direction: direction / len,
        })
    }
}

impl Curve for Line {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.origin + self.direction * t)
    }

    fn tangent(&self, _t: f64) -> Result<Vector3> {
        Ok(self.direction)
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn project(&self, point: &Point3) -> f64 {
        (point - self.origin).dot(&self.direction)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parameter_is_arc_length() {
        let l = Line::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0)).unwrap();
        let p = l.evaluate(3.0).unwrap();
        assert!((p - Point3::new(1.0, 3.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn project_drops_perpendicular_offset() {
        let l = Line::new(Point3::origin(), Vector3::x()).unwrap();
        let t = l.project(&Point3::new(2.5, 4.0, -1.0));
        assert!((t - 2.5).abs() < 1e-12);
    }

    #[test]
    fn zero_direction_rejected() {
        assert!(Line::new(Point3::origin(), Vector3::zeros()).is_err());
    }
}
