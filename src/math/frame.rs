use crate::error::GeometryError;

use super::{Point3, Vector3, TOLERANCE};

/// Right-handed orthonormal placement, the local system of every analytic
/// curve and surface.
///
/// `z` is the axis (or plane normal), `x` the reference direction and
/// `y = z x x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub origin: Point3,
    pub x: Vector3,
    pub y: Vector3,
    pub z: Vector3,
}

impl Frame {
    /// Builds a frame from an axis and a reference hint.
    ///
    /// The hint only needs to be roughly perpendicular to `z`; its component
    /// along `z` is removed. A hint parallel to `z` falls back to the world
    /// axis least aligned with `z`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::ZeroVector`] when `z` has no length.
    pub fn new(origin: Point3, z: Vector3, x_hint: Vector3) -> Result<Self, GeometryError> {
        let len = z.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector);
        }
        let z = z / len;
        let mut x = x_hint - z * x_hint.dot(&z);
        if x.norm() <= 1e-9 {
            let fallback = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
            x = fallback - z * fallback.dot(&z);
        }
        let x = x.normalize();
        Ok(Self {
            origin,
            x,
            y: z.cross(&x),
            z,
        })
    }

    /// World axes at `origin`.
    #[must_use]
    pub fn at_origin(origin: Point3) -> Self {
        Self {
            origin,
            x: Vector3::x(),
            y: Vector3::y(),
            z: Vector3::z(),
        }
    }

    /// Unit direction at angle `angle` in the `x`/`y` plane.
    #[must_use]
    pub fn radial(&self, angle: f64) -> Vector3 {
        self.x * angle.cos() + self.y * angle.sin()
    }

    /// Derivative of [`Frame::radial`] with respect to the angle.
    #[must_use]
    pub fn tangential(&self, angle: f64) -> Vector3 {
        self.y * angle.cos() - self.x * angle.sin()
    }

    /// World point of local coordinates.
    #[must_use]
    pub fn point(&self, a: f64, b: f64, c: f64) -> Point3 {
        self.origin + self.x * a + self.y * b + self.z * c
    }

    /// Local coordinates of a world point.
    #[must_use]
    pub fn local(&self, p: &Point3) -> Vector3 {
        let d = p - self.origin;
        Vector3::new(d.dot(&self.x), d.dot(&self.y), d.dot(&self.z))
    }

    /// Cylindrical coordinates `(angle, radial distance, height)` of a world
    /// point; the angle lies in `[0, 2 pi)`.
    #[must_use]
    pub fn cylindrical(&self, p: &Point3) -> (f64, f64, f64) {
        let l = self.local(p);
        let angle = l.y.atan2(l.x).rem_euclid(std::f64::consts::TAU);
        (angle, l.x.hypot(l.y), l.z)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn removes_axis_component_from_hint() {
        let f = Frame::new(Point3::origin(), Vector3::new(0.0, 0.0, 3.0), Vector3::new(1.0, 0.0, 1.0)).unwrap();
        assert!((f.x - Vector3::x()).norm() < 1e-12);
        assert!((f.y - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn parallel_hint_falls_back() {
        let f = Frame::new(Point3::origin(), Vector3::x(), Vector3::x()).unwrap();
        assert!(f.x.dot(&f.z).abs() < 1e-12);
        assert!((f.x.norm() - 1.0).abs() < 1e-12);
        assert!(Frame::new(Point3::origin(), Vector3::zeros(), Vector3::x()).is_err());
    }

    #[test]
    fn local_inverts_point() {
        let f = Frame::new(Point3::new(1.0, 2.0, 3.0), Vector3::new(1.0, 1.0, 0.0), Vector3::z()).unwrap();
        let p = f.point(0.5, -2.0, 4.0);
        assert!((f.local(&p) - Vector3::new(0.5, -2.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn cylindrical_angle_is_positive() {
        let f = Frame::at_origin(Point3::origin());
        let (angle, r, h) = f.cylindrical(&Point3::new(0.0, -2.0, 1.0));
        assert!((angle - 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert!((r - 2.0).abs() < 1e-12);
        assert!((h - 1.0).abs() < 1e-12);
        assert!((f.tangential(0.0) - Vector3::y()).norm() < 1e-12);
    }
}
