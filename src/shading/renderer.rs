//! Hillshade rendering seam.

use serde::{Deserialize, Serialize};

use super::raster::Raster;
use super::surface::PreparedSurface;
use crate::error::ShadingError;

/// Illumination direction of an observation, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunGeometry {
    /// Clockwise from north.
    pub azimuth: f64,
    /// Angle between the sun and the local vertical.
    pub incidence: f64,
}

impl SunGeometry {
    pub fn new(azimuth: f64, incidence: f64) -> Self {
        Self {
            azimuth,
            incidence,
        }
    }

    /// Sun elevation above the horizon.
    pub fn altitude(&self) -> f64 {
        90.0 - self.incidence
    }
}

/// Renders an 8-bit hillshade of a prepared surface.
pub trait ShadingRenderer {
    fn render(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
        zfactor: f64,
    ) -> Result<Raster<u8>, ShadingError>;
}

impl<R: ShadingRenderer + ?Sized> ShadingRenderer for &R {
    fn render(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
        zfactor: f64,
    ) -> Result<Raster<u8>, ShadingError> {
        (**self).render(surface, sun, zfactor)
    }
}
