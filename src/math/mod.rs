mod frame;
pub mod minimize;
pub mod polygon_2d;

pub use frame::Frame;

/// 2D point type, used for surface parameter-space coordinates.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Returns `n` evenly spaced values from `start` to `end`, both inclusive.
///
/// A single sample sits at the midpoint of the range.
#[must_use]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.5 * (start + end)],
        _ => {
            #[allow(clippy::cast_precision_loss)]
            let step = (end - start) / (n - 1) as f64;
            #[allow(clippy::cast_precision_loss)]
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Shifts `value` by whole multiples of `period` so that it lies within
/// half a period of `reference`.
#[must_use]
pub fn unwrap_near(value: f64, reference: f64, period: f64) -> f64 {
    let k = ((reference - value) / period).round();
    value + k * period
}
