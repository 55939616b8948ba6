//! Runtime configuration loaded from a JSON file.
//!
//! Every field has a default, so a partial file (or none at all) works.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::{EmulationOptions, FreshnessPolicy};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "AGRISPECTRAL_CONFIG";
/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "agrispectral.json";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub synthetic: SyntheticConfig,
    pub emulation: EmulationOptions,
}

/// Estimator and reducer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ridge regularization strength.
    pub ridge_alpha: f64,
    pub freshness: FreshnessPolicy,
    /// Freshness threshold (%) a session starts with.
    pub default_threshold: f64,
    pub histogram_bins: usize,
    pub pca_components: usize,
    /// Standard deviations below this count as zero when standardizing.
    pub variance_epsilon: f64,
    /// Share of samples held out to score the model; 0 disables.
    pub holdout_fraction: f64,
    pub holdout_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ridge_alpha: 1.0,
            freshness: FreshnessPolicy::default(),
            default_threshold: 70.0,
            histogram_bins: 20,
            pca_components: 3,
            variance_epsilon: 1e-12,
            holdout_fraction: 0.0,
            holdout_seed: 7,
        }
    }
}

/// Synthetic sample generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub samples: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            samples: 100,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, falling back to defaults (with a warning) when
    /// the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Resolve the config source: explicit path, then `$AGRISPECTRAL_CONFIG`,
    /// then `agrispectral.json` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            return Self::load_from_file(path);
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(local);
        }
        log::debug!("[Config] No config file found, using defaults");
        Self::default()
    }
}
