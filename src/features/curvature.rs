use crate::geometry::surface::{Surface, SurfaceGeometry};
use crate::math::Vector3;

/// Principal curvatures `(k1, k2)` with `k1 >= k2` at `(u, v)`, from
/// central differences of the surface with steps `hu`, `hv`.
///
/// Signs follow `normal`: a surface curving away from the normal has
/// negative curvature. Returns `None` when a stencil point cannot be
/// evaluated or the first fundamental form is singular.
#[must_use]
pub fn principal_curvatures(
    surface: &SurfaceGeometry,
    u: f64,
    v: f64,
    hu: f64,
    hv: f64,
    normal: &Vector3,
) -> Option<(f64, f64)> {
    let d = surface.domain();
    // Keep the stencil inside finite domain ends.
    let u = shift_inside(u, d.u_min, d.u_max, hu, surface.u_period().is_some());
    let v = shift_inside(v, d.v_min, d.v_max, hv, surface.v_period().is_some());
    let p = |du: f64, dv: f64| surface.evaluate(u + du, v + dv).ok().map(|q| q.coords);

    let c = p(0.0, 0.0)?;
    let (up, um) = (p(hu, 0.0)?, p(-hu, 0.0)?);
    let (vp, vm) = (p(0.0, hv)?, p(0.0, -hv)?);
    let (pp, pm, mp, mm) = (p(hu, hv)?, p(hu, -hv)?, p(-hu, hv)?, p(-hu, -hv)?);

    let su = (up - um) / (2.0 * hu);
    let sv = (vp - vm) / (2.0 * hv);
    let suu = (up - c * 2.0 + um) / (hu * hu);
    let svv = (vp - c * 2.0 + vm) / (hv * hv);
    let suv = (pp - pm - mp + mm) / (4.0 * hu * hv);

    let (e, f, g) = (su.dot(&su), su.dot(&sv), sv.dot(&sv));
    let (l, m, n) = (suu.dot(normal), suv.dot(normal), svv.dot(normal));
    let det = e * g - f * f;
    if det.abs() < 1e-18 {
        return None;
    }
    let gaussian = (l * n - m * m) / det;
    let mean = (e * n - 2.0 * f * m + g * l) / (2.0 * det);
    let disc = (mean * mean - gaussian).max(0.0).sqrt();
    let (k1, k2) = (mean + disc, mean - disc);
    (k1.is_finite() && k2.is_finite()).then_some((k1, k2))
}

fn shift_inside(t: f64, min: f64, max: f64, h: f64, periodic: bool) -> f64 {
    if periodic || !(min.is_finite() && max.is_finite()) || max - min <= 2.0 * h {
        return t;
    }
    t.clamp(min + h, max - h)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::surface::{Cylinder, Plane, Sphere};
    use crate::math::{Frame, Point3};
    use approx::assert_relative_eq;

    #[test]
    fn plane_is_flat() {
        let s = SurfaceGeometry::Plane(Plane::new(Frame::at_origin(Point3::origin())));
        let (k1, k2) = principal_curvatures(&s, 0.3, 0.7, 1e-4, 1e-4, &Vector3::z()).unwrap();
        assert!(k1.abs() < 1e-6 && k2.abs() < 1e-6);
    }

    #[test]
    fn sphere_curves_away_from_outward_normal() {
        let s = SurfaceGeometry::Sphere(Sphere::new(Frame::at_origin(Point3::origin()), 2.0).unwrap());
        let n = s.normal(1.0, 0.2).unwrap();
        let (k1, k2) = principal_curvatures(&s, 1.0, 0.2, 1e-4, 1e-4, &n).unwrap();
        assert_relative_eq!(k1, -0.5, epsilon = 1e-4);
        assert_relative_eq!(k2, -0.5, epsilon = 1e-4);
    }

    #[test]
    fn cylinder_has_one_zero_curvature() {
        let s = SurfaceGeometry::Cylinder(Cylinder::new(Frame::at_origin(Point3::origin()), 4.0).unwrap());
        let n = s.normal(0.5, 1.0).unwrap();
        let (k1, k2) = principal_curvatures(&s, 0.5, 1.0, 1e-4, 1e-4, &n).unwrap();
        assert_relative_eq!(k1, 0.0, epsilon = 1e-4);
        assert_relative_eq!(k2, -0.25, epsilon = 1e-4);
    }
}
