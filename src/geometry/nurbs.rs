//! B-spline basis evaluation shared by curves and surfaces.
//!
//! Knot vectors are stored fully expanded (each knot repeated by its
//! multiplicity). A basis of degree `p` over `n + 1` control points needs
//! `n + p + 2` knots.

use crate::error::{GeometryError, Result};

/// Expands STEP-style `(multiplicities, knots)` into a flat knot vector.
///
/// # Errors
///
/// Returns an error if the two lists differ in length, a multiplicity is
/// zero, or the knots decrease.
pub fn expand_knots(multiplicities: &[usize], knots: &[f64]) -> Result<Vec<f64>> {
    if multiplicities.len() != knots.len() {
        return Err(GeometryError::Degenerate(format!(
            "{} knot multiplicities for {} knots",
            multiplicities.len(),
            knots.len()
        ))
        .into());
    }
    let mut expanded = Vec::with_capacity(multiplicities.iter().sum());
    for (&m, &k) in multiplicities.iter().zip(knots) {
        if m == 0 {
            return Err(GeometryError::Degenerate("zero knot multiplicity".into()).into());
        }
        if expanded.last().is_some_and(|&last: &f64| k < last) {
            return Err(GeometryError::Degenerate("knot vector is decreasing".into()).into());
        }
        expanded.extend(std::iter::repeat_n(k, m));
    }
    Ok(expanded)
}

/// Checks that `knots` fits `count` control points of `degree`.
///
/// # Errors
///
/// Returns an error if the sizes disagree or the knot span is empty.
pub fn validate(degree: usize, count: usize, knots: &[f64]) -> Result<()> {
    if degree == 0 || count <= degree {
        return Err(GeometryError::Degenerate(format!(
            "degree {degree} needs more than {count} control points"
        ))
        .into());
    }
    if knots.len() != count + degree + 1 {
        return Err(GeometryError::Degenerate(format!(
            "expected {} knots for {count} control points of degree {degree}, found {}",
            count + degree + 1,
            knots.len()
        ))
        .into());
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(GeometryError::Degenerate("knot vector is decreasing".into()).into());
    }
    if knots[count] - knots[degree] <= 0.0 {
        return Err(GeometryError::Degenerate("empty knot span".into()).into());
    }
    Ok(())
}

/// Parameter range `[knots[p], knots[n + 1]]` over which the basis is a
/// partition of unity.
#[must_use]
pub fn parameter_range(degree: usize, count: usize, knots: &[f64]) -> (f64, f64) {
    (knots[degree], knots[count])
}

/// Finds the knot span index containing `t`, clamping `t` into range.
#[must_use]
pub fn find_span(degree: usize, count: usize, t: f64, knots: &[f64]) -> usize {
    let n = count - 1;
    if t >= knots[n + 1] {
        // Last non-empty span.
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        return degree;
    }
    let (mut low, mut high) = (degree, n + 1);
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Evaluates the non-vanishing basis functions and their first derivatives
/// at `t` in knot span `span`.
///
/// Returns `(values, derivatives)`, each with `degree + 1` entries for
/// control points `span - degree ..= span`.
#[must_use]
pub fn basis_with_derivative(span: usize, t: f64, degree: usize, knots: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let p = degree;
    // ndu[j][r]: basis values (upper triangle) and knot differences (lower).
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r].abs() > 0.0 {
                ndu[r][j - 1] / ndu[j][r]
            } else {
                0.0
            };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let values: Vec<f64> = (0..=p).map(|j| ndu[j][p]).collect();
    #[allow(clippy::cast_precision_loss)]
    let degree_f = p as f64;
    let derivatives = (0..=p)
        .map(|r| {
            let mut d = 0.0;
            if r >= 1 && ndu[p][r - 1].abs() > 0.0 {
                d += ndu[r - 1][p - 1] / ndu[p][r - 1];
            }
            if r < p && ndu[p][r].abs() > 0.0 {
                d -= ndu[r][p - 1] / ndu[p][r];
            }
            d * degree_f
        })
        .collect();
    (values, derivatives)
}
