//! Scoring primitives.
//!
//! A RANSAC-style inlier count over a user-provided residual function plugs
//! into the generic `Scoring` trait from `core`.

use crate::core::Scoring;
use crate::models::Homography;
use crate::types::{DataMatrix, Point2};

/// Inlier count, tie-broken by the (negated) summed residual of the inliers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Score {
    pub inlier_count: usize,
    /// Negative sum of inlier residuals; larger is better.
    pub value: f64,
}

impl Score {
    pub fn new(inlier_count: usize, value: f64) -> Self {
        Self {
            inlier_count,
            value,
        }
    }
}

/// RANSAC-style scoring that counts inliers using a residual function.
///
/// The residual function takes `(data, model, row_index)` and returns a
/// non-negative residual value.
pub struct RansacInlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    threshold: f64,
    residual_fn: F,
    _marker: std::marker::PhantomData<M>,
}

impl<M, F> RansacInlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    pub fn new(threshold: f64, residual_fn: F) -> Self {
        Self {
            threshold,
            residual_fn,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<M, F> Scoring<M> for RansacInlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    type Score = Score;

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Self::Score {
        inliers_out.clear();
        let mut residual_sum = 0.0;
        for i in 0..data.nrows() {
            let r = (self.residual_fn)(data, model, i);
            if r <= self.threshold {
                inliers_out.push(i);
                residual_sum += r;
            }
        }
        Score::new(inliers_out.len(), -residual_sum)
    }
}

/// Forward reprojection residual of row `idx` under a homography.
pub fn homography_residual(data: &DataMatrix, model: &Homography, idx: usize) -> f64 {
    let src = Point2::new(data[(idx, 0)], data[(idx, 1)]);
    let dst = Point2::new(data[(idx, 2)], data[(idx, 3)]);
    model.transfer_error(&src, &dst)
}

pub type HomographyResidualFn = fn(&DataMatrix, &Homography, usize) -> f64;

pub type HomographyScoring = RansacInlierCountScoring<Homography, HomographyResidualFn>;

/// Scoring used by the homography fitter.
pub fn homography_scoring(threshold: f64) -> HomographyScoring {
    RansacInlierCountScoring::new(threshold, homography_residual as HomographyResidualFn)
}
