//! Saturation and contrast statistics of a hillshade inside a mask.

use serde::Serialize;

use super::raster::{Raster, RoiMask};
use crate::error::ShadingError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaskedStatistics {
    /// Fraction of masked pixels above the highlight cut-off.
    pub prop_high_sat: f64,
    /// Fraction of masked pixels below the shadow cut-off.
    pub prop_low_sat: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub stdev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastEvaluator {
    pub high_saturation: u8,
    pub low_saturation: u8,
}

impl Default for ContrastEvaluator {
    fn default() -> Self {
        Self {
            high_saturation: 250,
            low_saturation: 5,
        }
    }
}

impl ContrastEvaluator {
    pub fn new(high_saturation: u8, low_saturation: u8) -> Self {
        Self {
            high_saturation,
            low_saturation,
        }
    }

    pub fn evaluate(
        &self,
        raster: &Raster<u8>,
        roi: &RoiMask,
    ) -> Result<MaskedStatistics, ShadingError> {
        if raster.width() != roi.width() || raster.height() != roi.height() {
            return Err(ShadingError::DimensionMismatch {
                width: roi.width(),
                height: roi.height(),
                actual_width: raster.width(),
                actual_height: raster.height(),
            });
        }
        if roi.is_empty() {
            return Err(ShadingError::EmptyMask);
        }

        let (mut high, mut low, mut sum) = (0usize, 0usize, 0.0f64);
        for &v in roi.select(raster) {
            if v > self.high_saturation {
                high += 1;
            }
            if v < self.low_saturation {
                low += 1;
            }
            sum += f64::from(v);
        }
        let n = roi.count() as f64;
        let mean = sum / n;
        let variance = roi
            .select(raster)
            .map(|&v| (f64::from(v) - mean).powi(2))
            .sum::<f64>()
            / n;

        Ok(MaskedStatistics {
            prop_high_sat: high as f64 / n,
            prop_low_sat: low as f64 / n,
            mean,
            stdev: variance.sqrt(),
        })
    }
}
