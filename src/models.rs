//! Geometric models produced by the estimators.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::Point2;

/// Homogeneous scale below which a projected point is treated as lying at
/// infinity.
pub const MIN_HOMOGENEOUS_SCALE: f64 = 1e-12;

/// Planar projective transformation represented by a 3x3 matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// Rebuild from the 8 free parameters with `h33` fixed to one.
    pub fn from_parameters(p: &[f64]) -> Self {
        Self::new(Matrix3::new(
            p[0], p[1], p[2], //
            p[3], p[4], p[5], //
            p[6], p[7], 1.0,
        ))
    }

    /// Map `p` through the transform, dividing by the third homogeneous
    /// coordinate. Returns `None` when that coordinate is (near) zero.
    pub fn project(&self, p: &Point2) -> Option<Point2> {
        let q = self.h * Vector3::new(p.x, p.y, 1.0);
        if q.z.abs() < MIN_HOMOGENEOUS_SCALE {
            return None;
        }
        Some(Point2::new(q.x / q.z, q.y / q.z))
    }

    /// Forward reprojection error `|dst - H(src)|`; infinite if `src` maps to
    /// infinity.
    pub fn transfer_error(&self, src: &Point2, dst: &Point2) -> f64 {
        match self.project(src) {
            Some(p) => (p - dst).norm(),
            None => f64::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_projects_onto_itself() {
        let p = Point2::new(3.5, -2.0);
        let q = Homography::identity().project(&p).unwrap();
        assert_relative_eq!(q, p);
    }

    #[test]
    fn projection_dehomogenises() {
        // Uniform scale by two in the homogeneous coordinate halves the point.
        let h = Homography::new(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0));
        let q = h.project(&Point2::new(4.0, 6.0)).unwrap();
        assert_relative_eq!(q, Point2::new(2.0, 3.0));
    }

    #[test]
    fn vanishing_scale_has_no_projection() {
        let h = Homography::new(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0));
        assert!(h.project(&Point2::new(0.0, 5.0)).is_none());
        assert!(h.transfer_error(&Point2::new(0.0, 5.0), &Point2::origin()).is_infinite());
    }
}
