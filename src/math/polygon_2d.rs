use super::{Point2, TOLERANCE};

/// Computes the signed area of a closed polygon in the UV plane
/// (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Returns `true` when `p` lies on the segment `a`-`b` within `tol`.
#[must_use]
pub fn point_on_segment(p: &Point2, a: &Point2, b: &Point2, tol: f64) -> bool {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.norm_squared();
    if len_sq < TOLERANCE * TOLERANCE {
        return ap.norm() <= tol;
    }
    let t = (ap.dot(&ab) / len_sq).clamp(0.0, 1.0);
    (ap - ab * t).norm() <= tol
}

/// Even-odd test of `p` against a set of closed loops.
///
/// Points on a loop boundary (within `tol`) count as inside, so the outer
/// boundary of a face is part of the face.
#[must_use]
pub fn point_in_loops(p: &Point2, loops: &[Vec<Point2>], tol: f64) -> bool {
    let mut inside = false;
    for ring in loops {
        let n = ring.len();
        if n < 2 {
            continue;
        }
        for i in 0..n {
            let a = &ring[i];
            let b = &ring[(i + 1) % n];
            if point_on_segment(p, a, b, tol) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

/// Axis-aligned bounds of all points in `loops`, as `(min, max)`.
#[must_use]
pub fn bounds(loops: &[Vec<Point2>]) -> Option<(Point2, Point2)> {
    let mut iter = loops.iter().flatten();
    let first = iter.next()?;
    let (mut min, mut max) = (*first, *first);
    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<Point2> {
        vec![
            Point2::new(min, min),
            Point2::new(max, min),
            Point2::new(max, max),
            Point2::new(min, max),
        ]
    }

    #[test]
    fn signed_area_ccw_square() {
        assert!((signed_area(&square(0.0, 1.0)) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_cw_square() {
        let mut pts = square(0.0, 1.0);
        pts.reverse();
        assert!((signed_area(&pts) + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_degenerate() {
        assert!(signed_area(&[Point2::new(0.0, 0.0)]).abs() < TOLERANCE);
        assert!(signed_area(&[]).abs() < TOLERANCE);
    }

    #[test]
    fn inside_outside_square() {
        let loops = vec![square(0.0, 1.0)];
        assert!(point_in_loops(&Point2::new(0.5, 0.5), &loops, 1e-9));
        assert!(!point_in_loops(&Point2::new(1.5, 0.5), &loops, 1e-9));
    }

    #[test]
    fn boundary_counts_as_inside() {
        let loops = vec![square(0.0, 1.0)];
        assert!(point_in_loops(&Point2::new(0.0, 0.3), &loops, 1e-9));
        assert!(point_in_loops(&Point2::new(1.0, 1.0), &loops, 1e-9));
    }

    #[test]
    fn hole_is_outside() {
        let loops = vec![square(0.0, 3.0), square(1.0, 2.0)];
        assert!(!point_in_loops(&Point2::new(1.5, 1.5), &loops, 1e-9));
        assert!(point_in_loops(&Point2::new(0.5, 1.5), &loops, 1e-9));
    }

    #[test]
    fn bounds_cover_all_loops() {
        let loops = vec![square(0.0, 1.0), square(-2.0, -1.0)];
        let (min, max) = bounds(&loops).unwrap_or((Point2::origin(), Point2::origin()));
        assert!((min.x + 2.0).abs() < TOLERANCE);
        assert!((max.y - 1.0).abs() < TOLERANCE);
        assert!(bounds(&[]).is_none());
    }
}
