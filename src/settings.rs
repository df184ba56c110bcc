//! Settings for the fitting, accuracy and shading stages.
//!
//! RANSAC defaults follow the conventions of the OpenCV
//! `findHomography(RANSAC)` call used for registration checks: a 3 px
//! reprojection threshold, 99.5% confidence and a bounded iteration budget.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Local optimisation applied to the best hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalOptimizationType {
    None,
    Lsq,
}

/// Main configuration object for the RANSAC pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacSettings {
    /// Minimum number of iterations.
    pub min_iterations: usize,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Inlier threshold on the forward reprojection error, in pixels.
    pub inlier_threshold: f64,
    /// Desired confidence level in \[0, 1\].
    pub confidence: f64,
    /// Fewest inliers a hypothesis needs before it is reported.
    pub min_inliers: usize,
    /// Fixed RNG seed; `None` seeds from system entropy.
    pub seed: Option<u64>,

    pub local_optimization: LocalOptimizationType,
    pub final_optimization: LocalOptimizationType,
}

impl Default for RansacSettings {
    fn default() -> Self {
        Self {
            min_iterations: 100,
            max_iterations: 2000,
            inlier_threshold: 3.0,
            confidence: 0.995,
            min_inliers: 4,
            seed: None,
            local_optimization: LocalOptimizationType::None,
            final_optimization: LocalOptimizationType::Lsq,
        }
    }
}

impl RansacSettings {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.inlier_threshold = threshold;
        self
    }
}

/// Where batch evaluation looks for correspondence artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracySettings {
    pub results_dir: PathBuf,
}

impl Default for AccuracySettings {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("Results/Worked"),
        }
    }
}

/// Z-factor search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingSettings {
    pub initial_guess: f64,
    pub max_iterations: usize,
    /// Lower bound applied after every update.
    pub min_zfactor: f64,
    /// Pixels strictly above this count as highlight-saturated.
    pub high_saturation: u8,
    /// Pixels strictly below this count as shadow-saturated.
    pub low_saturation: u8,
    /// Elevations at or above this value are outside the region of interest.
    pub nodata: f64,
}

impl Default for ShadingSettings {
    fn default() -> Self {
        Self {
            initial_guess: 1.0,
            max_iterations: 10,
            min_zfactor: 0.5,
            high_saturation: 250,
            low_saturation: 5,
            nodata: 32767.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ransac_settings() {
        let cfg = RansacSettings::default();
        assert_eq!(cfg.min_iterations, 100);
        assert_eq!(cfg.max_iterations, 2000);
        assert!((cfg.inlier_threshold - 3.0).abs() < 1e-12);
        assert!((cfg.confidence - 0.995).abs() < 1e-12);
        assert_eq!(cfg.min_inliers, 4);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.final_optimization, LocalOptimizationType::Lsq);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RansacSettings =
            serde_json::from_str(r#"{"seed": 7, "local_optimization": "lsq"}"#).unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.local_optimization, LocalOptimizationType::Lsq);
        assert_eq!(cfg.max_iterations, 2000);
    }

    #[test]
    fn shading_defaults() {
        let cfg: ShadingSettings = serde_json::from_str(r#"{"initial_guess": 2.5}"#).unwrap();
        assert_eq!(cfg.initial_guess, 2.5);
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.min_zfactor, 0.5);
        assert_eq!((cfg.high_saturation, cfg.low_saturation), (250, 5));
        assert_eq!(cfg.nodata, 32767.0);
    }
}
