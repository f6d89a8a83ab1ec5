use crate::error::{GeometryError, Result};
use crate::geometry::nurbs;
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A B-spline curve, optionally rational.
///
/// `C(t) = sum(N_i,p(t) * w_i * P_i) / sum(N_i,p(t) * w_i)` with unit
/// weights for the non-rational case.
#[derive(Debug, Clone)]
pub struct BSplineCurve {
    degree: usize,
    control_points: Vec<Point3>,
    weights: Option<Vec<f64>>,
    knots: Vec<f64>,
    closed: bool,
}

impl BSplineCurve {
    /// Creates a B-spline curve from an expanded knot vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the knot vector does not fit the control points,
    /// or a weight count or value is invalid.
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        weights: Option<Vec<f64>>,
        knots: Vec<f64>,
    ) -> Result<Self> {
        nurbs::validate(degree, control_points.len(), &knots)?;
        if let Some(w) = &weights {
            if w.len() != control_points.len() {
                return Err(GeometryError::Degenerate(format!(
                    "{} weights for {} control points",
                    w.len(),
                    control_points.len()
                ))
                .into());
            }
            if w.iter().any(|&wi| wi <= 0.0 || !wi.is_finite()) {
                return Err(
                    GeometryError::Degenerate("weights must be positive".into()).into(),
                );
            }
        }
        let closed = match (control_points.first(), control_points.last()) {
            (Some(a), Some(b)) => (a - b).norm() < 1e-9,
            _ => false,
        };
        Ok(Self {
            degree,
            control_points,
            weights,
            knots,
            closed,
        })
    }

    /// Returns the polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the control points.
    #[must_use]
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    fn weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i])
    }

    /// Point and first derivative at `t`.
    fn point_and_derivative(&self, t: f64) -> (Point3, Vector3) {
        let count = self.control_points.len();
        let t = self.domain().clamp(t);
        let span = nurbs::find_span(self.degree, count, t, &self.knots);
        let (n, dn) = nurbs::basis_with_derivative(span, t, self.degree, &self.knots);

        let mut a = Vector3::zeros();
        let mut da = Vector3::zeros();
        let mut w = 0.0;
        let mut dw = 0.0;
        for j in 0..=self.degree {
            let i = span - self.degree + j;
            let wi = self.weight(i);
            let p = self.control_points[i].coords * wi;
            a += p * n[j];
            da += p * dn[j];
            w += wi * n[j];
            dw += wi * dn[j];
        }
        let point = a / w;
        let derivative = (da - point * dw) / w;
        (Point3::from(point), derivative)
    }
}

impl Curve for BSplineCurve {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.point_and_derivative(t).0)
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        let (_, d) = self.point_and_derivative(t);
        let len = d.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(d / len)
    }

    fn domain(&self) -> CurveDomain {
        let (t_min, t_max) =
            nurbs::parameter_range(self.degree, self.control_points.len(), &self.knots);
        CurveDomain::new(t_min, t_max)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn project(&self, point: &Point3) -> f64 {
        let samples = (self.control_points.len() * 8).clamp(32, 400);
        super::project_by_search(self, point, samples)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn quarter_circle() -> BSplineCurve {
        BSplineCurve::new(
            2,
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Some(vec![1.0, FRAC_1_SQRT_2, 1.0]),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn linear_spline_interpolates_segment() {
        let c = BSplineCurve::new(
            1,
            vec![Point3::origin(), Point3::new(2.0, 0.0, 0.0)],
            None,
            vec![0.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let p = c.evaluate(0.25).unwrap();
        assert!((p - Point3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
        assert!((c.tangent(0.5).unwrap() - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn rational_quarter_circle_stays_on_circle() {
        let c = quarter_circle();
        for i in 0..=10 {
            let t = f64::from(i) / 10.0;
            let p = c.evaluate(t).unwrap();
            assert!((p.coords.norm() - 1.0).abs() < 1e-12, "t = {t}");
        }
    }

    #[test]
    fn tangent_is_perpendicular_to_radius() {
        let c = quarter_circle();
        let p = c.evaluate(0.3).unwrap();
        let t = c.tangent(0.3).unwrap();
        assert!(p.coords.dot(&t).abs() < 1e-9);
    }

    #[test]
    fn evaluation_clamps_out_of_domain() {
        let c = quarter_circle();
        let p = c.evaluate(5.0).unwrap();
        assert!((p - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn project_finds_parameter() {
        let c = quarter_circle();
        let target = c.evaluate(0.62).unwrap();
        let t = c.project(&target);
        assert!((c.evaluate(t).unwrap() - target).norm() < 1e-7);
    }

    #[test]
    fn rejects_bad_weights() {
        let r = BSplineCurve::new(
            1,
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            Some(vec![1.0]),
            vec![0.0, 0.0, 1.0, 1.0],
        );
        assert!(r.is_err());
    }
}
