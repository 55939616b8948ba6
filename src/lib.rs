//! AgriSpectral: fruit-quality analytics over emulated 18-band spectral readings.
//!
//! ```text
//!   SampleSource ──► SampleSet ──┬──► estimator (ridge fit, freshness tiers)
//!                                └──► reducer   (histograms, PCA)
//! ```
//!
//! The dashboard binary and the export functions consume a [`session::Session`],
//! which owns one sample set and everything derived from it.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod session;

pub use error::PipelineError;
