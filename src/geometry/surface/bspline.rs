use crate::error::{GeometryError, Result};
use crate::geometry::nurbs;
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A tensor-product B-spline surface, optionally rational.
///
/// Control points are indexed `[i][j]` with `i` along U and `j` along V.
#[derive(Debug, Clone)]
pub struct BSplineSurface {
    u_degree: usize,
    v_degree: usize,
    control_points: Vec<Vec<Point3>>,
    weights: Option<Vec<Vec<f64>>>,
    u_knots: Vec<f64>,
    v_knots: Vec<f64>,
}

/// Point with both first partial derivatives.
struct Frame {
    point: Point3,
    du: Vector3,
    dv: Vector3,
}

impl BSplineSurface {
    /// Creates a B-spline surface from expanded knot vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the control net is ragged, a knot vector does not
    /// fit its direction, or the weights do not match the net.
    pub fn new(
        u_degree: usize,
        v_degree: usize,
        control_points: Vec<Vec<Point3>>,
        weights: Option<Vec<Vec<f64>>>,
        u_knots: Vec<f64>,
        v_knots: Vec<f64>,
    ) -> Result<Self> {
        let nu = control_points.len();
        let nv = control_points.first().map_or(0, Vec::len);
        if control_points.iter().any(|row| row.len() != nv) {
            return Err(GeometryError::Degenerate("ragged control net".into()).into());
        }
        nurbs::validate(u_degree, nu, &u_knots)?;
        nurbs::validate(v_degree, nv, &v_knots)?;
        if let Some(w) = &weights {
            let shape_ok = w.len() == nu && w.iter().all(|row| row.len() == nv);
            if !shape_ok {
                return Err(
                    GeometryError::Degenerate("weights do not match control net".into()).into(),
                );
            }
            if w.iter().flatten().any(|&wi| wi <= 0.0 || !wi.is_finite()) {
                return Err(
                    GeometryError::Degenerate("weights must be positive".into()).into(),
                );
            }
        }
        Ok(Self {
            u_degree,
            v_degree,
            control_points,
            weights,
            u_knots,
            v_knots,
        })
    }

    /// Returns `(u_degree, v_degree)`.
    #[must_use]
    pub fn degrees(&self) -> (usize, usize) {
        (self.u_degree, self.v_degree)
    }

    fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i][j])
    }

    fn frame(&self, u: f64, v: f64) -> Frame {
        let (u, v) = self.domain().clamp(u, v);
        let nu = self.control_points.len();
        let nv = self.control_points[0].len();
        let su = nurbs::find_span(self.u_degree, nu, u, &self.u_knots);
        let sv = nurbs::find_span(self.v_degree, nv, v, &self.v_knots);
        let (bu, dbu) = nurbs::basis_with_derivative(su, u, self.u_degree, &self.u_knots);
        let (bv, dbv) = nurbs::basis_with_derivative(sv, v, self.v_degree, &self.v_knots);

        let (mut a, mut au, mut av) = (Vector3::zeros(), Vector3::zeros(), Vector3::zeros());
        let (mut w, mut wu, mut wv) = (0.0, 0.0, 0.0);
        for k in 0..=self.u_degree {
            let i = su - self.u_degree + k;
            for l in 0..=self.v_degree {
                let j = sv - self.v_degree + l;
                let wij = self.weight(i, j);
                let p = self.control_points[i][j].coords * wij;
                a += p * (bu[k] * bv[l]);
                au += p * (dbu[k] * bv[l]);
                av += p * (bu[k] * dbv[l]);
                w += wij * bu[k] * bv[l];
                wu += wij * dbu[k] * bv[l];
                wv += wij * bu[k] * dbv[l];
            }
        }
        let point = a / w;
        Frame {
            point: Point3::from(point),
            du: (au - point * wu) / w,
            dv: (av - point * wv) / w,
        }
    }
}

impl Surface for BSplineSurface {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.frame(u, v).point)
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        let f = self.frame(u, v);
        let n = f.du.cross(&f.dv);
        let len = n.norm();
        if len < TOLERANCE {
            return Err(GeometryError::Degenerate(format!(
                "b-spline surface normal vanishes at ({u}, {v})"
            ))
            .into());
        }
        Ok(n / len)
    }

    fn domain(&self) -> SurfaceDomain {
        let (u_min, u_max) =
            nurbs::parameter_range(self.u_degree, self.control_points.len(), &self.u_knots);
        let (v_min, v_max) =
            nurbs::parameter_range(self.v_degree, self.control_points[0].len(), &self.v_knots);
        SurfaceDomain::new(u_min, u_max, v_min, v_max)
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let n = self.control_points.len().max(self.control_points[0].len());
        super::project_by_search(self, point, (n * 4).clamp(12, 48))
    }
}
