//! Geometry decoding: STEP curve and surface entities to kernel types.
//!
//! File-level problems (missing references, wrong attribute types) are
//! errors. Geometry the kernel cannot represent, or that fails validation,
//! is returned as `Unsupported` so that only the affected face or edge is
//! dropped later.

use crate::error::GeometryLoadError;
use crate::geometry::curve::{BSplineCurve, Circle, CurveGeometry, Ellipse, Line, Polyline};
use crate::geometry::nurbs;
use crate::geometry::surface::{
    BSplineSurface, Cone, Cylinder, Extrusion, Plane, Revolution, Sphere, SurfaceGeometry, Torus,
};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};
use crate::topology::{EdgeCurve, FaceSurface};

use super::entity::{Args, EntityTable};
use super::tokenizer::Entity;

/// Nesting limit for curves that wrap other curves.
const MAX_DEPTH: usize = 8;

/// Result of decoding a geometric entity the kernel may not support.
enum Decoded<T> {
    Ok(T),
    Unsupported(String),
}

/// Decodes geometry entities from an [`EntityTable`].
pub struct Decoder<'t, 'a> {
    table: &'t EntityTable<'a>,
    angle_scale: f64,
}

impl<'t, 'a> Decoder<'t, 'a> {
    /// Creates a decoder, detecting the plane angle unit of the file.
    #[must_use]
    pub fn new(table: &'t EntityTable<'a>) -> Self {
        Self {
            table,
            angle_scale: detect_angle_scale(table),
        }
    }

    /// Radians per file angle unit.
    #[must_use]
    pub fn angle_scale(&self) -> f64 {
        self.angle_scale
    }

    fn entity(&self, id: u32, referenced_by: u32) -> Result<&'t Entity<'a>, GeometryLoadError> {
        self.table.get(id, referenced_by)
    }

    /// `CARTESIAN_POINT`; 2D points get `z = 0`.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed point.
    pub fn point(&self, id: u32, referenced_by: u32) -> Result<Point3, GeometryLoadError> {
        let args = Args::of(self.entity(id, referenced_by)?, "CARTESIAN_POINT")?;
        let c = args.reals(1)?;
        match c.as_slice() {
            [x, y, z] => Ok(Point3::new(*x, *y, *z)),
            [x, y] => Ok(Point3::new(*x, *y, 0.0)),
            _ => Err(args.invalid(format!("{} coordinates", c.len()))),
        }
    }

    /// `DIRECTION`, not normalized.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed direction.
    pub fn direction(&self, id: u32, referenced_by: u32) -> Result<Vector3, GeometryLoadError> {
        let args = Args::of(self.entity(id, referenced_by)?, "DIRECTION")?;
        let c = args.reals(1)?;
        match c.as_slice() {
            [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
            [x, y] => Ok(Vector3::new(*x, *y, 0.0)),
            _ => Err(args.invalid(format!("{} direction ratios", c.len()))),
        }
    }

    /// `VECTOR`: direction scaled by magnitude.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed vector.
    pub fn vector(&self, id: u32, referenced_by: u32) -> Result<Vector3, GeometryLoadError> {
        let args = Args::of(self.entity(id, referenced_by)?, "VECTOR")?;
        let dir = self.direction(args.reference(1)?, id)?;
        let magnitude = args.real(2)?;
        let len = dir.norm();
        if len < TOLERANCE {
            return Err(args.invalid("zero direction"));
        }
        Ok(dir / len * magnitude)
    }

    /// `AXIS2_PLACEMENT_3D` with defaulted axes; `x` is made orthogonal to `z`.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed placement.
    pub fn placement(&self, id: u32, referenced_by: u32) -> Result<Frame, GeometryLoadError> {
        let args = Args::of(self.entity(id, referenced_by)?, "AXIS2_PLACEMENT_3D")?;
        let origin = self.point(args.reference(1)?, id)?;
        let z = match args.optional_reference(2)? {
            Some(d) => self.direction(d, id)?,
            None => Vector3::z(),
        };
        let hint = match args.optional_reference(3)? {
            Some(d) => self.direction(d, id)?,
            None => Vector3::x(),
        };
        Frame::new(origin, z, hint).map_err(|_| args.invalid("zero axis"))
    }

    /// `AXIS1_PLACEMENT` as `(origin, unit axis)`.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing or malformed placement.
    pub fn axis1(&self, id: u32, referenced_by: u32) -> Result<(Point3, Vector3), GeometryLoadError> {
        let args = Args::of(self.entity(id, referenced_by)?, "AXIS1_PLACEMENT")?;
        let origin = self.point(args.reference(1)?, id)?;
        let axis = match args.optional_reference(2)? {
            Some(d) => self.direction(d, id)?,
            None => Vector3::z(),
        };
        if axis.norm() < TOLERANCE {
            return Err(args.invalid("zero axis"));
        }
        Ok((origin, axis.normalize()))
    }

    /// Decodes the curve of an edge.
    ///
    /// # Errors
    ///
    /// Returns an error only for file-level problems.
    pub fn curve(&self, id: u32, referenced_by: u32) -> Result<EdgeCurve, GeometryLoadError> {
        Ok(match self.curve_at(id, referenced_by, 0)? {
            Decoded::Ok(c) => EdgeCurve::Curve(c),
            Decoded::Unsupported(reason) => EdgeCurve::Unsupported(reason),
        })
    }

    fn curve_at(&self, id: u32, referenced_by: u32, depth: usize) -> Result<Decoded<CurveGeometry>, GeometryLoadError> {
        if depth > MAX_DEPTH {
            return Ok(Decoded::Unsupported(format!("curve #{id} nests too deeply")));
        }
        let entity = self.entity(id, referenced_by)?;
        if entity.has("B_SPLINE_CURVE") || entity.name() == "B_SPLINE_CURVE_WITH_KNOTS" {
            return self.bspline_curve(entity);
        }
        let args = Args::any(entity);
        let built = match args.name() {
            "LINE" => {
                let origin = self.point(args.reference(1)?, id)?;
                let dir = self.vector(args.reference(2)?, id)?;
                Line::new(origin, dir).map(CurveGeometry::Line)
            }
            "CIRCLE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Circle::new(f, args.real(2)?).map(CurveGeometry::Circle)
            }
            "ELLIPSE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Ellipse::new(f, args.real(2)?, args.real(3)?).map(CurveGeometry::Ellipse)
            }
            "POLYLINE" => {
                let points = args
                    .references(1)?
                    .into_iter()
                    .map(|p| self.point(p, id))
                    .collect::<Result<Vec<_>, _>>()?;
                Polyline::new(points).map(CurveGeometry::Polyline)
            }
            "SURFACE_CURVE" | "SEAM_CURVE" | "INTERSECTION_CURVE" => {
                return self.curve_at(args.reference(1)?, id, depth + 1);
            }
            "TRIMMED_CURVE" => return self.curve_at(args.reference(1)?, id, depth + 1),
            other => return Ok(Decoded::Unsupported(other.to_string())),
        };
        Ok(match built {
            Ok(c) => Decoded::Ok(c),
            Err(e) => Decoded::Unsupported(format!("{} #{id}: {e}", args.name())),
        })
    }

    fn bspline_curve(&self, entity: &Entity<'a>) -> Result<Decoded<CurveGeometry>, GeometryLoadError> {
        let id = entity.id;
        let (degree, cps, mults, knots, weights) = if let Some(base) = Args::part(entity, "B_SPLINE_CURVE") {
            let with_knots = Args::part(entity, "B_SPLINE_CURVE_WITH_KNOTS")
                .ok_or_else(|| base.invalid("complex b-spline curve without knots"))?;
            let weights = match Args::part(entity, "RATIONAL_B_SPLINE_CURVE") {
                Some(r) => Some(r.reals(0)?),
                None => None,
            };
            (base.count(0)?, base.references(1)?, with_knots.counts(0)?, with_knots.reals(1)?, weights)
        } else {
            let a = Args::of(entity, "B_SPLINE_CURVE_WITH_KNOTS")?;
            (a.count(1)?, a.references(2)?, a.counts(6)?, a.reals(7)?, None)
        };
        let points = cps
            .into_iter()
            .map(|p| self.point(p, id))
            .collect::<Result<Vec<_>, _>>()?;
        let built = nurbs::expand_knots(&mults, &knots)
            .and_then(|k| BSplineCurve::new(degree, points, weights, k));
        Ok(match built {
            Ok(c) => Decoded::Ok(CurveGeometry::BSpline(c)),
            Err(e) => Decoded::Unsupported(format!("B_SPLINE_CURVE #{id}: {e}")),
        })
    }

    /// Decodes the surface of a face.
    ///
    /// # Errors
    ///
    /// Returns an error only for file-level problems.
    pub fn surface(&self, id: u32, referenced_by: u32) -> Result<FaceSurface, GeometryLoadError> {
        Ok(match self.surface_at(id, referenced_by, 0)? {
            Decoded::Ok(s) => FaceSurface::Surface(s),
            Decoded::Unsupported(reason) => FaceSurface::Unsupported(reason),
        })
    }

    fn surface_at(&self, id: u32, referenced_by: u32, depth: usize) -> Result<Decoded<SurfaceGeometry>, GeometryLoadError> {
        if depth > MAX_DEPTH {
            return Ok(Decoded::Unsupported(format!("surface #{id} nests too deeply")));
        }
        let entity = self.entity(id, referenced_by)?;
        if entity.has("B_SPLINE_SURFACE") || entity.name() == "B_SPLINE_SURFACE_WITH_KNOTS" {
            return self.bspline_surface(entity);
        }
        let args = Args::any(entity);
        let built = match args.name() {
            "PLANE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Ok(SurfaceGeometry::Plane(Plane::new(f)))
            }
            "CYLINDRICAL_SURFACE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Cylinder::new(f, args.real(2)?).map(SurfaceGeometry::Cylinder)
            }
            "CONICAL_SURFACE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Cone::new(f, args.real(2)?, args.real(3)? * self.angle_scale).map(SurfaceGeometry::Cone)
            }
            "SPHERICAL_SURFACE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Sphere::new(f, args.real(2)?).map(SurfaceGeometry::Sphere)
            }
            "TOROIDAL_SURFACE" => {
                let f = self.placement(args.reference(1)?, id)?;
                Torus::new(f, args.real(2)?, args.real(3)?).map(SurfaceGeometry::Torus)
            }
            "SURFACE_OF_LINEAR_EXTRUSION" => {
                let profile = match self.curve_at(args.reference(1)?, id, depth + 1)? {
                    Decoded::Ok(c) => c,
                    Decoded::Unsupported(r) => {
                        return Ok(Decoded::Unsupported(format!("extrusion of {r}")))
                    }
                };
                let sweep = self.vector(args.reference(2)?, id)?;
                Extrusion::new(profile, sweep).map(SurfaceGeometry::Extrusion)
            }
            "SURFACE_OF_REVOLUTION" => {
                let profile = match self.curve_at(args.reference(1)?, id, depth + 1)? {
                    Decoded::Ok(c) => c,
                    Decoded::Unsupported(r) => {
                        return Ok(Decoded::Unsupported(format!("revolution of {r}")))
                    }
                };
                let (origin, axis) = self.axis1(args.reference(2)?, id)?;
                Revolution::new(profile, origin, axis).map(SurfaceGeometry::Revolution)
            }
            "RECTANGULAR_TRIMMED_SURFACE" => {
                return self.surface_at(args.reference(1)?, id, depth + 1);
            }
            other => return Ok(Decoded::Unsupported(other.to_string())),
        };
        Ok(match built {
            Ok(s) => Decoded::Ok(s),
            Err(e) => Decoded::Unsupported(format!("{} #{id}: {e}", args.name())),
        })
    }

    fn bspline_surface(&self, entity: &Entity<'a>) -> Result<Decoded<SurfaceGeometry>, GeometryLoadError> {
        let id = entity.id;
        #[allow(clippy::type_complexity)]
        let (u_degree, v_degree, grid, knot_args, weights): (usize, usize, Vec<Vec<u32>>, (Vec<usize>, Vec<usize>, Vec<f64>, Vec<f64>), Option<Vec<Vec<f64>>>) =
            if let Some(base) = Args::part(entity, "B_SPLINE_SURFACE") {
                let k = Args::part(entity, "B_SPLINE_SURFACE_WITH_KNOTS")
                    .ok_or_else(|| base.invalid("complex b-spline surface without knots"))?;
                let weights = match Args::part(entity, "RATIONAL_B_SPLINE_SURFACE") {
                    Some(r) => Some(r.real_grid(0)?),
                    None => None,
                };
                (
                    base.count(0)?,
                    base.count(1)?,
                    base.reference_grid(2)?,
                    (k.counts(0)?, k.counts(1)?, k.reals(2)?, k.reals(3)?),
                    weights,
                )
            } else {
                let a = Args::of(entity, "B_SPLINE_SURFACE_WITH_KNOTS")?;
                (
                    a.count(1)?,
                    a.count(2)?,
                    a.reference_grid(3)?,
                    (a.counts(8)?, a.counts(9)?, a.reals(10)?, a.reals(11)?),
                    None,
                )
            };
        let net = grid
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|p| self.point(p, id))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (u_mults, v_mults, u_knots, v_knots) = knot_args;
        let built = nurbs::expand_knots(&u_mults, &u_knots).and_then(|uk| {
            let vk = nurbs::expand_knots(&v_mults, &v_knots)?;
            BSplineSurface::new(u_degree, v_degree, net, weights, uk, vk)
        });
        Ok(match built {
            Ok(s) => Decoded::Ok(SurfaceGeometry::BSpline(s)),
            Err(e) => Decoded::Unsupported(format!("B_SPLINE_SURFACE #{id}: {e}")),
        })
    }
}

/// Radians per plane-angle unit: degrees when the file declares a
/// conversion-based `DEGREE` plane angle unit, radians otherwise.
fn detect_angle_scale(table: &EntityTable<'_>) -> f64 {
    let degrees = table.iter().any(|e| {
        e.has("PLANE_ANGLE_UNIT")
            && Args::part(e, "CONVERSION_BASED_UNIT")
                .and_then(|a| a.string(0).ok())
                .is_some_and(|name| name.eq_ignore_ascii_case("DEGREE"))
    });
    if degrees {
        std::f64::consts::PI / 180.0
    } else {
        1.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::Curve;
    use crate::geometry::surface::{Surface, SurfaceKind};

    fn with_table<F: FnOnce(&Decoder<'_, '_>)>(statements: &[&str], f: F) {
        let table = EntityTable::parse(statements).unwrap();
        let decoder = Decoder::new(&table);
        f(&decoder);
    }

    const FRAME: [&str; 4] = [
        "#1=CARTESIAN_POINT('',(0.,0.,1.));",
        "#2=DIRECTION('',(0.,0.,1.));",
        "#3=DIRECTION('',(1.,0.,0.));",
        "#4=AXIS2_PLACEMENT_3D('',#1,#2,#3);",
    ];

    fn statements(extra: &[&'static str]) -> Vec<&'static str> {
        FRAME.iter().copied().chain(extra.iter().copied()).collect()
    }

    #[test]
    fn placement_defaults_and_orthogonalizes() {
        let s = [
            "#1=CARTESIAN_POINT('',(1.,2.,3.));",
            "#2=DIRECTION('',(0.,0.,2.));",
            "#3=DIRECTION('',(1.,0.,1.));",
            "#4=AXIS2_PLACEMENT_3D('',#1,#2,#3);",
            "#5=AXIS2_PLACEMENT_3D('',#1,$,$);",
        ];
        with_table(&s, |d| {
            let f = d.placement(4, 0).unwrap();
            assert!((f.z - Vector3::z()).norm() < 1e-12);
            assert!((f.x - Vector3::x()).norm() < 1e-12);
            let g = d.placement(5, 0).unwrap();
            assert!((g.y - Vector3::y()).norm() < 1e-12);
        });
    }

    #[test]
    fn decodes_circle_and_line() {
        let s = statements(&[
            "#5=CIRCLE('',#4,2.5);",
            "#6=VECTOR('',#3,10.);",
            "#7=LINE('',#1,#6);",
            "#8=SURFACE_CURVE('',#5,(),.CURVE_3D.);",
        ]);
        with_table(&s, |d| {
            let EdgeCurve::Curve(c) = d.curve(8, 0).unwrap() else {
                panic!("circle should decode");
            };
            assert_eq!(c.kind_name(), "circle");
            let p = c.evaluate(0.0).unwrap();
            assert!((p - Point3::new(2.5, 0.0, 1.0)).norm() < 1e-12);
            let EdgeCurve::Curve(l) = d.curve(7, 0).unwrap() else {
                panic!("line should decode");
            };
            assert!((l.tangent(0.0).unwrap() - Vector3::x()).norm() < 1e-12);
        });
    }

    #[test]
    fn unknown_curve_is_unsupported() {
        let s = statements(&["#5=OFFSET_CURVE_3D('',#9,1.,.F.,#3);"]);
        with_table(&s, |d| {
            assert!(matches!(d.curve(5, 0).unwrap(), EdgeCurve::Unsupported(n) if n == "OFFSET_CURVE_3D"));
        });
    }

    #[test]
    fn invalid_geometry_is_unsupported_not_fatal() {
        let s = statements(&["#5=CYLINDRICAL_SURFACE('',#4,0.);"]);
        with_table(&s, |d| {
            assert!(matches!(d.surface(5, 0).unwrap(), FaceSurface::Unsupported(_)));
        });
    }

    #[test]
    fn missing_reference_is_fatal() {
        let s = statements(&["#5=CIRCLE('',#40,2.);"]);
        with_table(&s, |d| {
            assert!(matches!(
                d.curve(5, 0),
                Err(GeometryLoadError::MissingEntity { id: 40, referenced_by: 5 })
            ));
        });
    }

    #[test]
    fn cone_apex_from_reference_radius() {
        let s = statements(&["#5=CONICAL_SURFACE('',#4,1.,0.785398163397448);"]);
        with_table(&s, |d| {
            let FaceSurface::Surface(SurfaceGeometry::Cone(c)) = d.surface(5, 0).unwrap() else {
                panic!("cone should decode");
            };
            assert!((c.apex() - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-9);
        });
    }

    #[test]
    fn degree_units_scale_angles() {
        let s = statements(&[
            "#5=CONICAL_SURFACE('',#4,1.,45.);",
            "#6=( CONVERSION_BASED_UNIT('DEGREE',#7) NAMED_UNIT(#8) PLANE_ANGLE_UNIT() );",
        ]);
        with_table(&s, |d| {
            assert!((d.angle_scale() - std::f64::consts::PI / 180.0).abs() < 1e-15);
            let FaceSurface::Surface(SurfaceGeometry::Cone(c)) = d.surface(5, 0).unwrap() else {
                panic!("cone should decode");
            };
            assert!((c.half_angle() - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        });
    }

    #[test]
    fn decodes_bspline_surface_simple_form() {
        let s = [
            "#1=CARTESIAN_POINT('',(0.,0.,0.));",
            "#2=CARTESIAN_POINT('',(0.,1.,0.));",
            "#3=CARTESIAN_POINT('',(1.,0.,0.));",
            "#4=CARTESIAN_POINT('',(1.,1.,1.));",
            "#5=B_SPLINE_SURFACE_WITH_KNOTS('',1,1,((#1,#2),(#3,#4)),.UNSPECIFIED.,.F.,.F.,.F.,(2,2),(2,2),(0.,1.),(0.,1.),.UNSPECIFIED.);",
        ];
        with_table(&s, |d| {
            let FaceSurface::Surface(surface) = d.surface(5, 0).unwrap() else {
                panic!("b-spline should decode");
            };
            assert_eq!(surface.kind(), SurfaceKind::BSpline);
            let p = surface.evaluate(0.5, 0.5).unwrap();
            assert!((p.z - 0.25).abs() < 1e-12);
        });
    }

    #[test]
    fn decodes_rational_bspline_curve_complex_form() {
        let s = [
            "#1=CARTESIAN_POINT('',(1.,0.,0.));",
            "#2=CARTESIAN_POINT('',(1.,1.,0.));",
            "#3=CARTESIAN_POINT('',(0.,1.,0.));",
            "#4=( BOUNDED_CURVE() B_SPLINE_CURVE(2,(#1,#2,#3),.CIRCULAR_ARC.,.F.,.F.) B_SPLINE_CURVE_WITH_KNOTS((3,3),(0.,1.),.PIECEWISE_BEZIER_KNOTS.) CURVE() GEOMETRIC_REPRESENTATION_ITEM() RATIONAL_B_SPLINE_CURVE((1.,0.707106781186548,1.)) REPRESENTATION_ITEM('') );",
        ];
        with_table(&s, |d| {
            let EdgeCurve::Curve(c) = d.curve(4, 0).unwrap() else {
                panic!("rational curve should decode");
            };
            let p = c.evaluate(0.5).unwrap();
            assert!((p.coords.norm() - 1.0).abs() < 1e-9);
        });
    }
}
