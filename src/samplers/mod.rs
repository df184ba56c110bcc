//! Sampling strategies for minimal sets.

pub mod uniform;

pub use uniform::UniformRandomSampler;
