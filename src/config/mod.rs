//! Configuration types for the log pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trial inclusion criteria applied while cataloging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Minimum number of qualifying trials for an individual to be kept
    #[serde(default = "default_min_num_trials")]
    pub min_num_trials: usize,

    /// Drop trials that lack any required file
    #[serde(default = "default_exclude_incomplete_trials")]
    pub exclude_incomplete_trials: bool,
}

fn default_min_num_trials() -> usize {
    4
}

fn default_exclude_incomplete_trials() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            min_num_trials: default_min_num_trials(),
            exclude_incomplete_trials: default_exclude_incomplete_trials(),
        }
    }
}

/// Path patterns used to recognise the three input file categories.
///
/// The recording machines wrote logs under fixed directory names, so these
/// are regular expressions over the full path rather than hard-coded tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Raw Unity logs (movement and gaze)
    #[serde(default = "default_raw_log_pattern")]
    pub raw_log_pattern: String,

    /// Unity summary event logs
    #[serde(default = "default_summary_log_pattern")]
    pub summary_log_pattern: String,

    /// 2D placement test results
    #[serde(default = "default_test_2d_pattern")]
    pub test_2d_pattern: String,
}

fn default_raw_log_pattern() -> String {
    r"^.*[\\/]RawLog.*".to_string()
}

fn default_summary_log_pattern() -> String {
    r"^.*[\\/]SummaryLog.*".to_string()
}

fn default_test_2d_pattern() -> String {
    r"^.*[\\/]GMDA[^\\/]*_Raw\.csv$".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            raw_log_pattern: default_raw_log_pattern(),
            summary_log_pattern: default_summary_log_pattern(),
            test_2d_pattern: default_test_2d_pattern(),
        }
    }
}

/// Output tables to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "enabled")]
    pub study_path: bool,
    #[serde(default = "enabled")]
    pub study_look: bool,
    #[serde(default = "enabled")]
    pub test_path: bool,
    #[serde(default = "enabled")]
    pub test_look: bool,
    #[serde(default = "enabled")]
    pub practice_path: bool,
    #[serde(default = "enabled")]
    pub practice_look: bool,
    #[serde(default = "enabled")]
    pub test_2d: bool,
    #[serde(default = "enabled")]
    pub test_vr: bool,
}

fn enabled() -> bool {
    true
}

impl OutputConfig {
    /// Every table selected.
    pub fn all() -> Self {
        Self {
            study_path: true,
            study_look: true,
            test_path: true,
            test_look: true,
            practice_path: true,
            practice_look: true,
            test_2d: true,
            test_vr: true,
        }
    }

    /// No table selected.
    pub fn none() -> Self {
        Self {
            study_path: false,
            study_look: false,
            test_path: false,
            test_look: false,
            practice_path: false,
            practice_look: false,
            test_2d: false,
            test_vr: false,
        }
    }

    /// Returns true if no table is selected.
    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::all()
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub outputs: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
