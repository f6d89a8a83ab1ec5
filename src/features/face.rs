use ndarray::Array3;

use crate::error::SamplingError;
use crate::geometry::curve::{Curve, CurveGeometry};
use crate::geometry::surface::{Surface, SurfaceDomain, SurfaceGeometry};
use crate::math::polygon_2d::{bounds, point_in_loops, signed_area};
use crate::math::{linspace, unwrap_near, Point2, Point3, Vector3};
use crate::topology::{Edge, Face, FaceSurface};

use super::curvature::principal_curvatures;
use super::{FaceSamples, SamplerConfig, UvBox};

/// Points per edge use when tracing a boundary loop into UV space.
const BOUNDARY_SAMPLES: usize = 16;

/// Fractions of the way toward the UV centre tried for failing points.
const NUDGES: [f64; 4] = [1e-4, 1e-3, 1e-2, 1e-1];

/// Relative extent below which a UV box or loop area is treated as empty.
const EMPTY: f64 = 1e-9;

/// One evaluated grid point.
#[derive(Debug, Clone, Copy)]
struct Cell {
    point: Point3,
    normal: Vector3,
    curvature: (f64, f64),
}

pub(super) fn sample_face(face: Face<'_>, config: &SamplerConfig) -> Result<FaceSamples, SamplingError> {
    let index = face.index();
    let surface = match face.surface() {
        FaceSurface::Surface(s) => s,
        FaceSurface::Unsupported(reason) => {
            return Err(SamplingError::UnsupportedSurface {
                face: index,
                reason: reason.clone(),
            })
        }
    };

    let loops = uv_loops(face, surface);
    let uv = parameter_box(index, surface, &loops)?;
    let extent = (uv.u_max - uv.u_min).max(uv.v_max - uv.v_min);
    let area: f64 = loops.iter().map(|l| signed_area(l).abs()).sum();
    let trimmed = area > EMPTY * extent * extent;
    let tol = 1e-6 * extent;
    let mask_loops = with_periodic_copies(loops, &uv, surface.u_period(), surface.v_period());

    let (nu, nv) = (config.face_u_samples, config.face_v_samples);
    let us = linspace(uv.u_min, uv.u_max, nu);
    let vs = linspace(uv.v_min, uv.v_max, nv);
    let centre = Point2::new(0.5 * (uv.u_min + uv.u_max), 0.5 * (uv.v_min + uv.v_max));
    let sign = if face.same_sense() { 1.0 } else { -1.0 };
    let steps = (
        1e-4 * (uv.u_max - uv.u_min).max(1e-6),
        1e-4 * (uv.v_max - uv.v_min).max(1e-6),
    );

    let mut cells: Vec<Option<Cell>> = Vec::with_capacity(nu * nv);
    let mut mask = Vec::with_capacity(nu * nv);
    for &u in &us {
        for &v in &vs {
            mask.push(!trimmed || point_in_loops(&Point2::new(u, v), &mask_loops, tol));
            cells.push(evaluate_cell(surface, u, v, &centre, sign, config.curvature.then_some(steps)));
        }
    }

    let valid = cells.iter().filter(|c| c.is_some()).count();
    if valid == 0 {
        return Err(SamplingError::Degenerate {
            face: index,
            reason: "no grid point could be evaluated".into(),
        });
    }
    let repaired = cells.len() - valid;
    let filled = fill_from_neighbours(&cells, nv);

    let channels = config.face_channels();
    let mut grid = Array3::<f32>::zeros((nu, nv, channels));
    let mut inside = 0;
    for (k, (cell, original)) in filled.iter().zip(&cells).enumerate() {
        let (i, j) = (k / nv, k % nv);
        let in_face = mask[k] && original.is_some();
        if in_face {
            inside += 1;
        }
        #[allow(clippy::cast_possible_truncation)]
        let mut values = vec![
            cell.point.x as f32,
            cell.point.y as f32,
            cell.point.z as f32,
            cell.normal.x as f32,
            cell.normal.y as f32,
            cell.normal.z as f32,
            if in_face { 1.0 } else { 0.0 },
        ];
        if config.curvature {
            #[allow(clippy::cast_possible_truncation)]
            values.extend([cell.curvature.0 as f32, cell.curvature.1 as f32]);
        }
        for (c, value) in values.into_iter().enumerate() {
            grid[[i, j, c]] = value;
        }
    }

    Ok(FaceSamples {
        grid,
        uv_bounds: uv,
        inside,
        repaired,
    })
}

/// Boundary loops of the face in UV space, outer loop first. Periodic
/// parameters are unwrapped so that each loop is continuous, and every
/// inner loop is shifted by whole periods to sit in the outer loop's window.
fn uv_loops(face: Face<'_>, surface: &SurfaceGeometry) -> Vec<Vec<Point2>> {
    let solid = face.solid();
    let (u_period, v_period) = (surface.u_period(), surface.v_period());
    let mut loops: Vec<Vec<Point2>> = Vec::new();
    for uses in face.loops() {
        let mut ring: Vec<Point2> = Vec::new();
        for edge_use in uses {
            let Some(edge) = solid.edge(edge_use.edge) else {
                continue;
            };
            for p in boundary_points(edge, edge_use.forward) {
                let (mut u, mut v) = surface.project(&p);
                if let Some(r) = ring.last() {
                    if let Some(period) = u_period {
                        u = unwrap_near(u, r.x, period);
                    }
                    if let Some(period) = v_period {
                        v = unwrap_near(v, r.y, period);
                    }
                }
                let q = Point2::new(u, v);
                if ring.last().is_some_and(|last| (last - q).norm() < 1e-12) {
                    continue;
                }
                ring.push(q);
            }
        }
        if ring.len() < 2 {
            continue;
        }
        if let Some((min, max)) = loops.first().and_then(|outer| bounds(std::slice::from_ref(outer))) {
            align_to(&mut ring, &min, &max, u_period, v_period);
        }
        loops.push(ring);
    }
    loops
}

/// Shifts `ring` by whole periods so its centre is as close as possible
/// to the centre of the `min`..`max` window.
fn align_to(ring: &mut [Point2], min: &Point2, max: &Point2, u_period: Option<f64>, v_period: Option<f64>) {
    let (lo, hi) = ring.iter().fold(
        (Point2::new(f64::INFINITY, f64::INFINITY), Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
        |(lo, hi), p| (Point2::new(lo.x.min(p.x), lo.y.min(p.y)), Point2::new(hi.x.max(p.x), hi.y.max(p.y))),
    );
    let shift = |period: Option<f64>, centre: f64, target: f64| {
        period.map_or(0.0, |p| ((target - centre) / p).round() * p)
    };
    let du = shift(u_period, 0.5 * (lo.x + hi.x), 0.5 * (min.x + max.x));
    let dv = shift(v_period, 0.5 * (lo.y + hi.y), 0.5 * (min.y + max.y));
    for p in ring.iter_mut() {
        p.x += du;
        p.y += dv;
    }
}

/// Loops used for the trimming mask: `loops` plus copies of every inner
/// loop shifted by one period that still overlap the box, so a hole
/// crossing the seam masks both ends of the box.
fn with_periodic_copies(
    mut loops: Vec<Vec<Point2>>,
    uv: &UvBox,
    u_period: Option<f64>,
    v_period: Option<f64>,
) -> Vec<Vec<Point2>> {
    let mut shifts = Vec::new();
    for du in u_period.map_or(vec![0.0], |p| vec![-p, 0.0, p]) {
        for dv in v_period.map_or(vec![0.0], |p| vec![-p, 0.0, p]) {
            if du.abs() > 0.0 || dv.abs() > 0.0 {
                shifts.push((du, dv));
            }
        }
    }
    let mut copies = Vec::new();
    for ring in loops.iter().skip(1) {
        for &(du, dv) in &shifts {
            let shifted: Vec<Point2> = ring.iter().map(|p| Point2::new(p.x + du, p.y + dv)).collect();
            let Some((lo, hi)) = bounds(std::slice::from_ref(&shifted)) else {
                continue;
            };
            let overlaps = lo.x < uv.u_max && hi.x > uv.u_min && lo.y < uv.v_max && hi.y > uv.v_min;
            if overlaps {
                copies.push(shifted);
            }
        }
    }
    loops.extend(copies);
    loops
}

/// 3D points along an edge in the direction the loop traverses it.
fn boundary_points(edge: Edge<'_>, forward: bool) -> Vec<Point3> {
    let (t0, t1) = edge.parameter_range();
    let (start, end) = (edge.start_point(), edge.end_point());
    let mut points: Vec<Point3> = match edge.curve().geometry() {
        Some(curve) => boundary_parameters(curve, t0, t1)
            .into_iter()
            .map(|t| curve.evaluate(t))
            .collect::<Result<_, _>>()
            .unwrap_or_else(|_| vec![start, end]),
        None => vec![start, end],
    };
    if !forward {
        points.reverse();
    }
    points
}

/// Curve parameters traced for a boundary edge: an even spread, plus the
/// corners of polylines so that straight-sided loops stay exact.
fn boundary_parameters(curve: &CurveGeometry, t0: f64, t1: f64) -> Vec<f64> {
    let mut ts = linspace(t0, t1, BOUNDARY_SAMPLES);
    if matches!(curve, CurveGeometry::Polyline(_)) {
        let (lo, hi) = (t0.min(t1), t0.max(t1));
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let corners = (lo.floor() as i64 + 1..=hi.ceil() as i64 - 1).map(|k| k as f64);
        ts.extend(corners);
        if t1 < t0 {
            ts.sort_by(|a, b| b.total_cmp(a));
        } else {
            ts.sort_by(f64::total_cmp);
        }
    }
    ts
}

/// Parametric box of the face: outer loop bounds (all loops when the outer
/// loop spans no area, as for a seamless cylinder bounded by two circles),
/// clamped into the surface domain along non-periodic directions.
fn parameter_box(face: usize, surface: &SurfaceGeometry, loops: &[Vec<Point2>]) -> Result<UvBox, SamplingError> {
    let domain = surface.domain();
    let outer = bounds(&loops[..loops.len().min(1)]);
    let Some((min, max)) = outer
        .filter(|(lo, hi)| !bounds_are_degenerate(lo, hi, (hi - lo).amax().max(1.0)))
        .or_else(|| bounds(loops))
    else {
        return domain_box(face, &domain);
    };
    let (u_min, u_max) = axis_range(min.x, max.x, domain.u_min, domain.u_max, surface.u_period());
    let (v_min, v_max) = axis_range(min.y, max.y, domain.v_min, domain.v_max, surface.v_period());
    let scale = (u_max - u_min).abs().max((v_max - v_min).abs()).max(1.0);
    if u_max - u_min <= EMPTY * scale || v_max - v_min <= EMPTY * scale {
        if bounds_are_degenerate(&min, &max, scale) && domain.is_finite() {
            return domain_box(face, &domain);
        }
        return Err(SamplingError::Degenerate {
            face,
            reason: "boundary spans no parametric area".into(),
        });
    }
    Ok(UvBox {
        u_min,
        u_max,
        v_min,
        v_max,
    })
}

fn bounds_are_degenerate(min: &Point2, max: &Point2, scale: f64) -> bool {
    max.x - min.x <= EMPTY * scale || max.y - min.y <= EMPTY * scale
}

fn domain_box(face: usize, domain: &SurfaceDomain) -> Result<UvBox, SamplingError> {
    if !domain.is_finite() {
        return Err(SamplingError::Unbounded { face });
    }
    Ok(UvBox {
        u_min: domain.u_min,
        u_max: domain.u_max,
        v_min: domain.v_min,
        v_max: domain.v_max,
    })
}

fn axis_range(lo: f64, hi: f64, d_min: f64, d_max: f64, period: Option<f64>) -> (f64, f64) {
    match period {
        Some(p) if hi - lo > p => (lo, lo + p),
        Some(_) => (lo, hi),
        None => (lo.max(d_min), hi.min(d_max)),
    }
}

/// Maps a periodic parameter into the base period starting at `min`.
fn wrap(value: f64, min: f64, period: Option<f64>) -> f64 {
    match period {
        Some(p) => min + (value - min).rem_euclid(p),
        None => value,
    }
}

fn evaluate_cell(
    surface: &SurfaceGeometry,
    u: f64,
    v: f64,
    centre: &Point2,
    sign: f64,
    curvature_steps: Option<(f64, f64)>,
) -> Option<Cell> {
    let domain = surface.domain();
    let attempt = |u: f64, v: f64| -> Option<Cell> {
        let eu = wrap(u, domain.u_min, surface.u_period());
        let ev = wrap(v, domain.v_min, surface.v_period());
        let point = surface.evaluate(eu, ev).ok()?;
        let normal = surface.normal(eu, ev).ok()? * sign;
        if !(point.coords.iter().all(|c| c.is_finite()) && normal.iter().all(|c| c.is_finite())) {
            return None;
        }
        let curvature = curvature_steps
            .and_then(|(hu, hv)| principal_curvatures(surface, eu, ev, hu, hv, &normal))
            .unwrap_or((0.0, 0.0));
        Some(Cell {
            point,
            normal,
            curvature,
        })
    };

    if let Some(cell) = attempt(u, v) {
        return Some(cell);
    }
    let (cu, cv) = clamp_non_periodic(surface, &domain, u, v);
    if let Some(cell) = attempt(cu, cv) {
        return Some(cell);
    }
    NUDGES.iter().find_map(|&s| {
        attempt(cu + (centre.x - cu) * s, cv + (centre.y - cv) * s)
    })
}

fn clamp_non_periodic(surface: &SurfaceGeometry, domain: &SurfaceDomain, u: f64, v: f64) -> (f64, f64) {
    let u = if surface.u_period().is_some() {
        u
    } else {
        u.clamp(domain.u_min, domain.u_max)
    };
    let v = if surface.v_period().is_some() {
        v
    } else {
        v.clamp(domain.v_min, domain.v_max)
    };
    (u, v)
}

/// Replaces failed cells by the nearest evaluated cell in grid distance,
/// first in row-major order on ties. At least one cell must be valid.
fn fill_from_neighbours(cells: &[Option<Cell>], nv: usize) -> Vec<Cell> {
    let valid: Vec<(usize, Cell)> = cells
        .iter()
        .enumerate()
        .filter_map(|(k, c)| c.map(|c| (k, c)))
        .collect();
    cells
        .iter()
        .enumerate()
        .map(|(k, cell)| {
            if let Some(c) = cell {
                return *c;
            }
            let (i, j) = (k / nv, k % nv);
            valid
                .iter()
                .min_by_key(|(other, _)| {
                    let (oi, oj) = (other / nv, other % nv);
                    i.abs_diff(oi).pow(2) + j.abs_diff(oj).pow(2)
                })
                .map_or(
                    Cell {
                        point: Point3::origin(),
                        normal: Vector3::zeros(),
                        curvature: (0.0, 0.0),
                    },
                    |(_, c)| *c,
                )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::surface::{Cone, Sphere};
    use crate::math::Frame;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    fn cone() -> SurfaceGeometry {
        SurfaceGeometry::Cone(Cone::new(Frame::at_origin(Point3::origin()), 0.0, 0.5).unwrap())
    }

    #[test]
    fn periodic_axis_is_not_clamped() {
        assert_eq!(axis_range(-0.5, 1.0, 0.0, TAU, Some(TAU)), (-0.5, 1.0));
        assert_eq!(axis_range(0.0, 7.0, 0.0, TAU, Some(TAU)), (0.0, TAU));
        assert_eq!(axis_range(-2.0, 3.0, 0.0, 1.0, None), (0.0, 1.0));
    }

    #[test]
    fn wrap_into_base_period() {
        assert!((wrap(-FRAC_PI_2, 0.0, Some(TAU)) - 1.5 * PI).abs() < 1e-12);
        assert!((wrap(3.0, 0.0, None) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn apex_point_is_nudged() {
        let c = cone();
        let centre = Point2::new(PI, 1.0);
        let cell = evaluate_cell(&c, 0.0, 0.0, &centre, 1.0, None).unwrap();
        assert!(cell.point.coords.norm() > 0.0);
        assert!((cell.normal.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unbounded_face_without_loops() {
        let c = cone();
        assert!(matches!(
            parameter_box(3, &c, &[]),
            Err(SamplingError::Unbounded { face: 3 })
        ));
        let s = SurfaceGeometry::Sphere(Sphere::new(Frame::at_origin(Point3::origin()), 1.0).unwrap());
        let b = parameter_box(0, &s, &[]).unwrap();
        assert!((b.u_max - b.u_min - TAU).abs() < 1e-12);
    }

    #[test]
    fn fill_copies_nearest_valid() {
        let a = Cell {
            point: Point3::new(1.0, 0.0, 0.0),
            normal: Vector3::z(),
            curvature: (0.0, 0.0),
        };
        let b = Cell {
            point: Point3::new(2.0, 0.0, 0.0),
            ..a
        };
        let cells = vec![Some(a), None, None, Some(b)];
        let filled = fill_from_neighbours(&cells, 2);
        assert_eq!(filled[1].point, a.point);
        assert_eq!(filled[2].point, a.point);
        assert_eq!(filled[3].point, b.point);
    }

    fn rect(u0: f64, u1: f64, v0: f64, v1: f64) -> Vec<Point2> {
        vec![
            Point2::new(u0, v0),
            Point2::new(u1, v0),
            Point2::new(u1, v1),
            Point2::new(u0, v1),
        ]
    }

    #[test]
    fn inner_loop_moves_into_outer_window() {
        let mut hole = rect(-1.9, -1.3, 4.0, 6.0);
        align_to(&mut hole, &Point2::new(0.0, 0.0), &Point2::new(TAU, 10.0), Some(TAU), None);
        assert!((hole[0].x - (TAU - 1.9)).abs() < 1e-12);
        assert!((hole[0].y - 4.0).abs() < 1e-12);
    }

    #[test]
    fn hole_across_seam_masks_both_ends() {
        let uv = UvBox {
            u_min: 0.0,
            u_max: TAU,
            v_min: 0.0,
            v_max: 10.0,
        };
        let loops = vec![rect(0.0, TAU, 0.0, 10.0), rect(-0.3, 0.3, 4.0, 6.0)];
        let mask_loops = with_periodic_copies(loops, &uv, Some(TAU), None);
        assert_eq!(mask_loops.len(), 3);
        let inside = |u: f64, v: f64| point_in_loops(&Point2::new(u, v), &mask_loops, 1e-9);
        assert!(!inside(0.1, 5.0));
        assert!(!inside(TAU - 0.1, 5.0));
        assert!(inside(PI, 5.0));
        assert!(inside(0.1, 2.0));
    }

    #[test]
    fn polyline_corners_are_traced() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]
            .map(|(x, y)| Point3::new(x, y, 0.0));
        let curve = CurveGeometry::Polyline(crate::geometry::curve::Polyline::new(square.to_vec()).unwrap());
        let ts = boundary_parameters(&curve, 4.0, 0.0);
        assert_eq!(ts.len(), BOUNDARY_SAMPLES + 3);
        assert!(ts.windows(2).all(|w| w[0] >= w[1]));
        for corner in [1.0, 2.0, 3.0] {
            assert!(ts.contains(&corner));
        }
    }
}
