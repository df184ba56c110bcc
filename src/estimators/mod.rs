//! Estimators for geometric models.
//!
//! Registration checks only need planar projective transforms, so the
//! homography estimator is the single built-in model.

pub mod homography;

pub use homography::HomographyEstimator;
