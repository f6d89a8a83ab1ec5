use ndarray::Array2;

use crate::geometry::curve::Curve;
use crate::math::{linspace, Point3, Vector3, TOLERANCE};
use crate::topology::Edge;

use super::EDGE_CHANNELS;

/// Samples positions and unit tangents along `edge` from its start to its
/// end vertex. Returns the `(samples, 6)` grid and whether the straight
/// chord was used instead of the curve.
pub(super) fn sample_edge(edge: Edge<'_>, samples: usize) -> (Array2<f32>, bool) {
    if let Some(rows) = curve_rows(edge, samples) {
        return (to_grid(&rows), false);
    }
    (to_grid(&chord_rows(edge.start_point(), edge.end_point(), samples)), true)
}

fn curve_rows(edge: Edge<'_>, samples: usize) -> Option<Vec<(Point3, Vector3)>> {
    let curve = edge.curve().geometry()?;
    let (t0, t1) = edge.parameter_range();
    let direction = if t1 < t0 { -1.0 } else { 1.0 };
    linspace(t0, t1, samples)
        .into_iter()
        .map(|t| {
            let p = curve.evaluate(t).ok()?;
            let tangent = curve.tangent(t).ok()? * direction;
            let finite = p.coords.iter().chain(tangent.iter()).all(|c| c.is_finite());
            finite.then_some((p, tangent))
        })
        .collect()
}

fn chord_rows(start: Point3, end: Point3, samples: usize) -> Vec<(Point3, Vector3)> {
    let chord = end - start;
    let len = chord.norm();
    let tangent = if len > TOLERANCE { chord / len } else { Vector3::zeros() };
    linspace(0.0, 1.0, samples)
        .into_iter()
        .map(|s| (start + chord * s, tangent))
        .collect()
}

fn to_grid(rows: &[(Point3, Vector3)]) -> Array2<f32> {
    let mut grid = Array2::<f32>::zeros((rows.len(), EDGE_CHANNELS));
    for (i, (p, t)) in rows.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let values = [p.x, p.y, p.z, t.x, t.y, t.z].map(|x| x as f32);
        for (c, value) in values.into_iter().enumerate() {
            grid[[i, c]] = value;
        }
    }
    grid
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::step::parse_step;
    use crate::step::tests::SPLIT_TUBE;
    use crate::topology::solid::tests::two_squares;

    #[test]
    fn line_edge_runs_start_to_end() {
        let solid = two_squares();
        let (grid, fallback) = sample_edge(solid.edge(1).unwrap(), 5);
        assert!(!fallback);
        assert_eq!(grid.shape(), &[5, 6]);
        assert!((grid[[0, 0]] - 1.0).abs() < 1e-6 && grid[[0, 1]].abs() < 1e-6);
        assert!((grid[[4, 1]] - 1.0).abs() < 1e-6);
        assert!((grid[[2, 4]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn arc_edge_tangent_follows_traversal() {
        let solid = parse_step(SPLIT_TUBE).unwrap();
        let arc = solid.edges().find(|e| e.curve().geometry().is_some_and(|c| c.kind_name() == "circle")).unwrap();
        let (grid, fallback) = sample_edge(arc, 10);
        assert!(!fallback);
        let start = arc.start_point();
        assert!((f64::from(grid[[0, 0]]) - start.x).abs() < 1e-4);
        let end = arc.end_point();
        assert!((f64::from(grid[[9, 0]]) - end.x).abs() < 1e-4);
        // Chord direction and first tangent agree in sign for a half turn.
        let chord = end - start;
        let t0 = Vector3::new(f64::from(grid[[1, 3]]), f64::from(grid[[1, 4]]), f64::from(grid[[1, 5]]));
        let mid = Vector3::new(f64::from(grid[[5, 0]]), f64::from(grid[[5, 1]]), f64::from(grid[[5, 2]]));
        assert!(t0.dot(&(mid - start.coords)) > 0.0);
        assert!(chord.norm() > 0.0);
    }

    #[test]
    fn chord_handles_closed_edge() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let rows = chord_rows(p, p, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].1, Vector3::zeros());
    }
}
