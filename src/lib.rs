//! # regshade - registration accuracy and hillshade tuning
//!
//! `regshade` has two engines:
//!
//! - **Registration accuracy.** Matched point pairs between two images are
//!   fitted with a RANSAC homography; the inliers are re-projected and the
//!   mean reprojection distance becomes one record of a durable, append-only
//!   accuracy table. Batches tolerate per-identifier failure.
//! - **Hillshade z-factor search.** A hillshade of a projected elevation
//!   model is rendered repeatedly while a list of contrast heuristics moves
//!   the z-factor, until it stops changing or the iteration budget ends.
//!
//! ## Quick Start
//!
//! ```rust
//! use regshade::fit::{fit_homography, reproject_and_score};
//! use regshade::types::Point2;
//!
//! let src: Vec<Point2> = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 3.0)]
//!     .iter()
//!     .map(|&(x, y)| Point2::new(x, y))
//!     .collect();
//! let dst: Vec<Point2> = src.iter().map(|p| Point2::new(p.x + 2.0, p.y - 1.0)).collect();
//!
//! let fit = fit_homography(&src, &dst, 3.0).unwrap();
//! let h = fit.homography.expect("five points in general position");
//! let mean = reproject_and_score(&src, &dst, &h).unwrap();
//! assert!(mean < 1e-6);
//! ```
//!
//! ## Extending
//!
//! The seams are traits:
//!
//! - **[`HomographyFitter`](fit::HomographyFitter)**: robust fitting strategy
//!   used by the accuracy evaluator
//! - **[`CorrespondenceSource`](accuracy::CorrespondenceSource)**: where
//!   correspondences for an identifier come from
//! - **[`ShadingRenderer`](shading::ShadingRenderer)** and
//!   **[`SurfaceProvider`](shading::SurfaceProvider)**: hillshade rendering
//!   and DEM clip/reprojection
//! - **[`Estimator`](core::Estimator)**, **[`Sampler`](core::Sampler)**,
//!   **[`Scoring`](core::Scoring)**, **[`LocalOptimizer`](core::LocalOptimizer)**
//!   and **[`TerminationCriterion`](core::TerminationCriterion)**: stages of
//!   the generic RANSAC pipeline
//!
//! ## Modules
//!
//! - **[`core`](core)**: pipeline traits and the generic `Ransac` loop
//! - **[`estimators`](estimators)**: homography estimator
//! - **[`samplers`](samplers)**: uniform minimal-sample sampler
//! - **[`scoring`](scoring)**: inlier-count scoring
//! - **[`fit`](fit)**: homography fitting and reprojection scoring
//! - **[`accuracy`](accuracy)**: per-identifier evaluation and the accuracy table
//! - **[`shading`](shading)**: z-factor optimizer and its collaborators
//! - **[`settings`](settings)** and **[`config`](config)**: configuration

pub mod accuracy;
pub mod config;
pub mod core;
pub mod error;
pub mod estimators;
pub mod fit;
pub mod models;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod shading;
pub mod types;
pub mod utils;

pub use accuracy::{AccuracyAggregator, AccuracyRecord, AccuracyTable, Outcome, Summary};
pub use config::Config;
pub use core::{Estimator, LocalOptimizer, Sampler, Scoring, TerminationCriterion};
pub use fit::{fit_homography, reproject_and_score, HomographyFit, HomographyFitter};
pub use settings::{AccuracySettings, RansacSettings, ShadingSettings};
pub use shading::{ShadingOptimizer, SunGeometry};
