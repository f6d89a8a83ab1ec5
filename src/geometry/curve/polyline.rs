use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A piecewise-linear curve through a list of points.
///
/// Segment `i` spans parameters `[i, i + 1]`, so the domain is
/// `[0, points.len() - 1]`.
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Vec<Point3>,
}

impl Polyline {
    /// Creates a polyline.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two points are given.
    pub fn new(points: Vec<Point3>) -> Result<Self> {
        if points.len() < 2 {
            return Err(
                GeometryError::Degenerate("polyline needs at least two points".into()).into(),
            );
        }
        Ok(Self { points })
    }

    /// Returns the polyline vertices.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    fn segment(&self, t: f64) -> (usize, f64) {
        let last = self.points.len() - 2;
        let t = self.domain().clamp(t);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let i = (t.floor() as usize).min(last);
        #[allow(clippy::cast_precision_loss)]
        let local = t - i as f64;
        (i, local)
    }
}

impl Curve for Polyline {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        let (i, s) = self.segment(t);
        let a = self.points[i];
        let b = self.points[i + 1];
        Ok(a + (b - a) * s)
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        let (i, _) = self.segment(t);
        let d = self.points[i + 1] - self.points[i];
        let len = d.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(d / len)
    }

    fn domain(&self) -> CurveDomain {
        #[allow(clippy::cast_precision_loss)]
        let end = (self.points.len() - 1) as f64;
        CurveDomain::new(0.0, end)
    }

    fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => (a - b).norm() < TOLERANCE,
            _ => false,
        }
    }

    fn project(&self, point: &Point3) -> f64 {
        let mut best = (f64::INFINITY, 0.0);
        for (i, w) in self.points.windows(2).enumerate() {
            let d = w[1] - w[0];
            let len_sq = d.norm_squared();
            let s = if len_sq < TOLERANCE {
                0.0
            } else {
                ((point - w[0]).dot(&d) / len_sq).clamp(0.0, 1.0)
            };
            let dist = (w[0] + d * s - point).norm_squared();
            if dist < best.0 {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f64 + s;
                best = (dist, t);
            }
        }
        best.1
    }
}
