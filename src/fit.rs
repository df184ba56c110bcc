//! Robust homography fitting and reprojection scoring.
//!
//! [`HomographyFitter`] is the seam between the accuracy evaluator and the
//! consensus algorithm. The built-in [`RansacHomographyFitter`] wires the
//! generic [`Ransac`] pipeline with the homography estimator, a uniform
//! sampler and inlier-count scoring; a fixed seed in [`RansacSettings`] makes
//! it fully deterministic.

use tracing::debug;

use crate::core::{LeastSquaresOptimizer, Ransac, RansacTerminationCriterion};
use crate::error::FitError;
use crate::estimators::HomographyEstimator;
use crate::models::Homography;
use crate::samplers::UniformRandomSampler;
use crate::scoring::{homography_scoring, HomographyScoring};
use crate::settings::{LocalOptimizationType, RansacSettings};
use crate::types::{CorrespondenceSet, Point2};

/// Fewest correspondences a homography can be fitted from.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Outcome of a robust fit.
///
/// `homography` is `None` for a degenerate fit; `mask` is then `None` too.
/// Otherwise `mask.len()` equals the number of input correspondences.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HomographyFit {
    pub homography: Option<Homography>,
    pub mask: Option<Vec<bool>>,
    pub iterations: usize,
}

impl HomographyFit {
    fn degenerate(iterations: usize) -> Self {
        Self {
            homography: None,
            mask: None,
            iterations,
        }
    }

    pub fn inlier_count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(0, |m| m.iter().filter(|&&inlier| inlier).count())
    }
}

/// Robust estimation strategy for a homography from correspondences.
pub trait HomographyFitter {
    /// Fit `src -> dst`, classifying pairs against `threshold` (pixels).
    fn fit(&self, correspondences: &CorrespondenceSet, threshold: f64) -> HomographyFit;
}

/// RANSAC-based fitter.
#[derive(Debug, Clone, Default)]
pub struct RansacHomographyFitter {
    pub settings: RansacSettings,
}

impl RansacHomographyFitter {
    pub fn new(settings: RansacSettings) -> Self {
        Self { settings }
    }

    fn optimizer(
        kind: LocalOptimizationType,
        threshold: f64,
    ) -> Option<LeastSquaresOptimizer<HomographyEstimator, HomographyScoring>> {
        match kind {
            LocalOptimizationType::None => None,
            LocalOptimizationType::Lsq => Some(LeastSquaresOptimizer::new(
                HomographyEstimator::new(),
                homography_scoring(threshold),
            )),
        }
    }
}

impl HomographyFitter for RansacHomographyFitter {
    fn fit(&self, correspondences: &CorrespondenceSet, threshold: f64) -> HomographyFit {
        let n = correspondences.len();
        if n < MIN_CORRESPONDENCES {
            debug!(pairs = n, "too few correspondences for a homography");
            return HomographyFit::degenerate(0);
        }

        let data = correspondences.to_data_matrix();
        let mut ransac = Ransac::new(
            self.settings.clone(),
            HomographyEstimator::new(),
            UniformRandomSampler::with_optional_seed(self.settings.seed),
            homography_scoring(threshold),
            Self::optimizer(self.settings.local_optimization, threshold),
            Self::optimizer(self.settings.final_optimization, threshold),
            RansacTerminationCriterion {
                confidence: self.settings.confidence,
            },
        );
        ransac.run(&data);

        let min_inliers = self.settings.min_inliers.max(MIN_CORRESPONDENCES);
        match ransac.best_model {
            Some(model) if ransac.best_inliers.len() >= min_inliers => {
                let mut mask = vec![false; n];
                for &i in &ransac.best_inliers {
                    mask[i] = true;
                }
                debug!(
                    pairs = n,
                    inliers = ransac.best_inliers.len(),
                    iterations = ransac.iteration,
                    "homography fitted"
                );
                HomographyFit {
                    homography: Some(model),
                    mask: Some(mask),
                    iterations: ransac.iteration,
                }
            }
            _ => {
                debug!(
                    pairs = n,
                    iterations = ransac.iteration,
                    "no hypothesis reached the minimal inlier support"
                );
                HomographyFit::degenerate(ransac.iteration)
            }
        }
    }
}

/// Fit with default RANSAC settings and the given threshold.
pub fn fit_homography(
    src: &[Point2],
    dst: &[Point2],
    threshold: f64,
) -> Result<HomographyFit, FitError> {
    let set = CorrespondenceSet::new(src.to_vec(), dst.to_vec())?;
    Ok(RansacHomographyFitter::default().fit(&set, threshold))
}

/// Mean Euclidean distance between `H(src[i])` and `dst[i]`.
///
/// `None` when the sequences are empty or differ in length, when any point
/// maps to infinity, or when the mean is not finite; callers record the
/// sentinel in that case.
pub fn reproject_and_score(src: &[Point2], dst: &[Point2], h: &Homography) -> Option<f64> {
    if src.is_empty() || src.len() != dst.len() {
        return None;
    }
    let mut total = 0.0;
    for (s, d) in src.iter().zip(dst) {
        total += (h.project(s)? - d).norm();
    }
    let mean = total / src.len() as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.98, -0.05, 30.0, //
            0.04, 1.02, -12.0, //
            2e-5, -1e-5, 1.0,
        ))
    }

    fn grid_points() -> Vec<Point2> {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                pts.push(Point2::new(20.0 + 73.0 * i as f64, 15.0 + 61.0 * j as f64));
            }
        }
        pts
    }

    fn seeded() -> RansacHomographyFitter {
        RansacHomographyFitter::new(RansacSettings::default().with_seed(42))
    }

    #[test]
    fn exact_correspondences_are_all_inliers() {
        let gt = ground_truth();
        let src = grid_points();
        let dst: Vec<Point2> = src.iter().map(|p| gt.project(p).unwrap()).collect();
        let set = CorrespondenceSet::new(src.clone(), dst.clone()).unwrap();

        let fit = seeded().fit(&set, 3.0);
        let h = fit.homography.as_ref().unwrap();
        assert_eq!(fit.mask.as_ref().unwrap().len(), src.len());
        assert_eq!(fit.inlier_count(), src.len());
        for (s, d) in src.iter().zip(&dst) {
            assert!(h.transfer_error(s, d) < 1e-6);
        }
        assert_abs_diff_eq!(reproject_and_score(&src, &dst, h).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn outliers_are_flagged() {
        let gt = ground_truth();
        let src = grid_points();
        let mut dst: Vec<Point2> = src.iter().map(|p| gt.project(p).unwrap()).collect();
        for k in [3usize, 11, 17, 25] {
            dst[k] += nalgebra::Vector2::new(40.0 + k as f64, -35.0);
        }
        let set = CorrespondenceSet::new(src, dst).unwrap();

        let fit = seeded().fit(&set, 3.0);
        let mask = fit.mask.unwrap();
        for (k, inlier) in mask.iter().enumerate() {
            assert_eq!(*inlier, ![3usize, 11, 17, 25].contains(&k), "pair {k}");
        }
    }

    #[test]
    fn seeded_fits_are_reproducible() {
        let gt = ground_truth();
        let src = grid_points();
        let mut dst: Vec<Point2> = src.iter().map(|p| gt.project(p).unwrap()).collect();
        dst[0] += nalgebra::Vector2::new(1.5, -0.7);
        dst[9] += nalgebra::Vector2::new(50.0, 50.0);
        let set = CorrespondenceSet::new(src, dst).unwrap();

        assert_eq!(seeded().fit(&set, 3.0), seeded().fit(&set, 3.0));
    }

    #[test]
    fn fewer_than_four_pairs_is_degenerate() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        let fit = fit_homography(&pts, &pts, 3.0).unwrap();
        assert!(fit.homography.is_none());
        assert!(fit.mask.is_none());
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src: Vec<Point2> = (0..8).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        let fit = seeded().fit(&CorrespondenceSet::new(src.clone(), src).unwrap(), 3.0);
        assert!(fit.homography.is_none());
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let err = fit_homography(&[Point2::origin()], &[], 3.0).unwrap_err();
        assert!(matches!(err, FitError::LengthMismatch { .. }));
    }

    #[test]
    fn score_is_mean_distance() {
        let src = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        let dst = [Point2::new(3.0, 4.0), Point2::new(1.0, 2.0)];
        let mean = reproject_and_score(&src, &dst, &Homography::identity()).unwrap();
        assert_abs_diff_eq!(mean, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn point_at_infinity_has_no_score() {
        // w = x, so the origin maps to infinity.
        let h = Homography::new(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0));
        let src = [Point2::new(0.0, 3.0), Point2::new(2.0, 3.0)];
        let dst = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.5)];
        assert!(reproject_and_score(&src, &dst, &h).is_none());
        assert!(reproject_and_score(&[], &[], &h).is_none());
    }
}
