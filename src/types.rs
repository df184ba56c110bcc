//! Core shared types for correspondence handling.
//!
//! Correspondences are stored row-wise in a dynamic `nalgebra` matrix so the
//! estimator, sampler and scoring stages can share one layout:
//! `[x_src, y_src, x_dst, y_dst]` per row.

use nalgebra::{DMatrix, Point2 as NaPoint2};

use crate::error::FitError;

/// Dynamic matrix of `f64`, one correspondence per row.
pub type DataMatrix = DMatrix<f64>;

/// A 2D image point in pixel units.
pub type Point2 = NaPoint2<f64>;

/// Two index-aligned point sequences, `src[i] <-> dst[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceSet {
    src: Vec<Point2>,
    dst: Vec<Point2>,
}

impl CorrespondenceSet {
    pub fn new(src: Vec<Point2>, dst: Vec<Point2>) -> Result<Self, FitError> {
        if src.len() != dst.len() {
            return Err(FitError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        Ok(Self { src, dst })
    }

    /// Build from `(x, y)` tuples.
    pub fn from_pairs(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Result<Self, FitError> {
        let to_points = |pts: &[(f64, f64)]| -> Vec<Point2> {
            pts.iter().map(|&(x, y)| Point2::new(x, y)).collect()
        };
        Self::new(to_points(src), to_points(dst))
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn src(&self) -> &[Point2] {
        &self.src
    }

    pub fn dst(&self) -> &[Point2] {
        &self.dst
    }

    /// Keep only the pairs whose mask entry is `true`.
    pub fn select(&self, mask: &[bool]) -> Self {
        let (src, dst) = self
            .src
            .iter()
            .zip(&self.dst)
            .zip(mask)
            .filter(|(_, &keep)| keep)
            .map(|((s, d), _)| (*s, *d))
            .unzip();
        Self { src, dst }
    }

    /// Pack into the N x 4 data matrix consumed by the RANSAC pipeline.
    pub fn to_data_matrix(&self) -> DataMatrix {
        let n = self.len();
        let mut data = DataMatrix::zeros(n, 4);
        for (i, (s, d)) in self.src.iter().zip(&self.dst).enumerate() {
            data[(i, 0)] = s.x;
            data[(i, 1)] = s.y;
            data[(i, 2)] = d.x;
            data[(i, 3)] = d.y;
        }
        data
    }
}
