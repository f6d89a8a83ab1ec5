use crate::error::Result;
use crate::math::{Frame, Point3, Vector3};

use super::{Surface, SurfaceDomain};

/// Unbounded plane through the frame origin; `u` runs along `x`, `v` along
/// `y` and the normal is `z`.
#[derive(Debug, Clone)]
pub struct Plane {
    frame: Frame,
}

impl Plane {
    /// Plane through `frame.origin` spanned by `frame.x` and `frame.y`.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

impl Surface for Plane {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.frame.point(u, v, 0.0))
    }

    fn normal(&self, _u: f64, _v: f64) -> Result<Vector3> {
        Ok(self.frame.z)
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let l = self.frame.local(point);
        (l.x, l.y)
    }
}
