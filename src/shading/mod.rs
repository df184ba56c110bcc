//! Adaptive hillshade z-factor selection.
//!
//! A [`SurfaceProvider`] prepares the projected elevation grid and its
//! region-of-interest mask once. [`ShadingOptimizer`] then renders through a
//! [`ShadingRenderer`], scores each render with [`ContrastEvaluator`] and
//! adjusts the z-factor with an ordered list of [`UpdateRule`]s.

pub mod contrast;
pub mod gdal;
pub mod optimizer;
pub mod raster;
pub mod renderer;
pub mod rules;
pub mod surface;

pub use contrast::{ContrastEvaluator, MaskedStatistics};
pub use gdal::{GdalHillshadeRenderer, GdalSurfaceProvider};
pub use optimizer::{IterationRecord, OptimizationOutcome, OptimizationState, ShadingOptimizer};
pub use raster::{Raster, RoiMask};
pub use renderer::{ShadingRenderer, SunGeometry};
pub use rules::{default_rules, UpdateRule};
pub use surface::{Footprint, PreparedSurface, SurfaceProvider};
