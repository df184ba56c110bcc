//! Error types for the library surface.
//!
//! Per-identifier problems during a batch (missing artifact, degenerate fit,
//! non-finite mean) are not errors: they become [`crate::accuracy::Outcome`]
//! values. The enums here cover the conditions that must reach the caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("correspondence sequences differ in length: src has {src}, dst has {dst}")]
    LengthMismatch { src: usize, dst: usize },
}

/// Failure to read a correspondence artifact that does exist.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed npy file {path}: {reason}")]
    MalformedNpy { path: PathBuf, reason: String },
    #[error(transparent)]
    Fit(#[from] FitError),
}

#[derive(Debug, Error)]
pub enum AccuracyError {
    #[error("failed to persist accuracy table {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt accuracy table {path} at line {line}: {reason}")]
    CorruptTable {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("failed to read identifier list {path}: {source}")]
    IdentifierList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ShadingError {
    #[error("region of interest mask is empty")]
    EmptyMask,
    #[error("raster is {actual_width}x{actual_height}, mask expects {width}x{height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },
    #[error("raster buffer holds {actual} values, {width}x{height} needs {expected}")]
    BufferLength {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("hillshade rendering failed: {0}")]
    Render(String),
    #[error("elevation surface preparation failed: {0}")]
    Surface(String),
    #[error("raster i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tiff decoding of {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },
    #[error("unsupported raster layout in {path}: {reason}")]
    UnsupportedRaster { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
