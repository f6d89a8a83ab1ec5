use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Frame, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// Torus around the frame's `z` axis.
///
/// `u` is the angle around the axis, `v` the angle around the tube, zero on
/// the outer equator.
#[derive(Debug, Clone)]
pub struct Torus {
    frame: Frame,
    major_radius: f64,
    minor_radius: f64,
}

impl Torus {
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] unless both radii are positive.
    pub fn new(frame: Frame, major_radius: f64, minor_radius: f64) -> Result<Self> {
        if major_radius.is_nan() || minor_radius.is_nan() || major_radius.min(minor_radius) <= TOLERANCE {
            return Err(
                GeometryError::Degenerate(format!("torus radii {major_radius}, {minor_radius}")).into(),
            );
        }
        Ok(Self {
            frame,
            major_radius,
            minor_radius,
        })
    }

    fn tube_direction(&self, u: f64, v: f64) -> Vector3 {
        self.frame.radial(u) * v.cos() + self.frame.z * v.sin()
    }
}

impl Surface for Torus {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        let ring = self.frame.origin + self.frame.radial(u) * self.major_radius;
        Ok(ring + self.tube_direction(u, v) * self.minor_radius)
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        Ok(self.tube_direction(u, v))
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, 0.0, TAU)
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn v_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let (u, rho, h) = self.frame.cylindrical(point);
        (u, h.atan2(rho - self.major_radius).rem_euclid(TAU))
    }
}
