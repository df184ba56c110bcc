//! Elevation surfaces ready for shading.
//!
//! Preparing a surface clips the global elevation model to the observation's
//! footprint and reprojects it. The region-of-interest mask is derived at the
//! same time and then reused for every render of that surface.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::raster::RoiMask;
use crate::error::ShadingError;

/// Geographic extent of one observation, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub identifier: String,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    /// Central meridian of the projected grid.
    pub center_lon: f64,
}

/// A projected elevation grid plus its valid-data mask.
#[derive(Debug, Clone)]
pub struct PreparedSurface {
    identifier: String,
    elevation_path: PathBuf,
    roi: RoiMask,
}

impl PreparedSurface {
    pub fn new(
        identifier: impl Into<String>,
        elevation_path: impl Into<PathBuf>,
        roi: RoiMask,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            elevation_path: elevation_path.into(),
            roi,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn elevation_path(&self) -> &Path {
        &self.elevation_path
    }

    pub fn roi(&self) -> &RoiMask {
        &self.roi
    }
}

/// Produces a [`PreparedSurface`] for a footprint.
pub trait SurfaceProvider {
    fn prepare(&self, footprint: &Footprint) -> Result<PreparedSurface, ShadingError>;
}
