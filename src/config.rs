//! Tunable thresholds for the analyzers, the cache and the worker pool.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minimum number of distinct active days before a velocity trend is reported
    pub velocity_window_days: usize,
    /// Peak days are those at or above `mean + k * stddev`
    pub peak_detection_k: f64,
    /// Cumulative commit share the top contributors must reach
    pub bus_factor_threshold: f64,
    /// Share of an extension's commits above which one author owns it
    pub knowledge_silo_threshold: f64,
    /// Minimum commits touching an extension before it can be a silo
    pub min_collaboration_threshold: usize,
    /// Number of collaboration pairs to report
    pub top_pairs: usize,
    /// Maximum number of cached reports
    pub cache_max_size: usize,
    /// Concurrent analyzer workers; 0 picks a size from the CPU count
    pub worker_pool_size: usize,
    /// Commits changing more lines than this count as large
    pub large_commit_lines: usize,
    /// Number of file hotspots to report
    pub hotspot_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            velocity_window_days: 14,
            peak_detection_k: 1.5,
            bus_factor_threshold: 0.5,
            knowledge_silo_threshold: 0.8,
            min_collaboration_threshold: 3,
            top_pairs: 10,
            cache_max_size: 100,
            worker_pool_size: 4,
            large_commit_lines: 500,
            hotspot_limit: 10,
        }
    }
}

impl AnalyticsConfig {
    /// Parse a JSON document, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// `<config dir>/gitpulse/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitpulse").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_share("bus_factor_threshold", self.bus_factor_threshold)?;
        check_share("knowledge_silo_threshold", self.knowledge_silo_threshold)?;
        if !(self.peak_detection_k.is_finite() && self.peak_detection_k > 0.0) {
            return Err(ConfigError::Invalid {
                field: "peak_detection_k",
                reason: format!("must be a positive number, got {}", self.peak_detection_k),
            });
        }
        if self.cache_max_size == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_max_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Worker count actually used by the engine.
    pub fn effective_worker_pool_size(&self) -> usize {
        if self.worker_pool_size > 0 {
            return self.worker_pool_size;
        }
        // Leave a quarter of the machine for everything else
        (num_cpus::get() * 3 / 4).max(1)
    }
}

fn check_share(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be within (0, 1], got {value}"),
        })
    }
}
