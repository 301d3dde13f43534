//! Generator configuration
//!
//! Layers, later overriding earlier: built-in defaults, the user config
//! (`config.yaml` in the platform config directory), `spcs.yaml` in the
//! working directory, then an explicit file. Command-line flags are
//! applied on top by the caller.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants::{
    DEFAULT_CPK_WINDOW, DEFAULT_REFERENCE_ATTEMPTS, DEFAULT_STANDARD_ATTEMPTS, DEFAULT_TARGET_CPK,
    MIN_POINTS_IN_REFERENCE, MIN_SUBGROUP_POINTS_IN_REFERENCE, SUBGROUP_ATTEMPTS,
};
use crate::core::generator::SearchSettings;
use crate::yaml::{parse_yaml_file, YamlError};

/// Project config file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "spcs.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub target_cpk: f64,
    pub cpk_window: f64,
    pub standard_attempts: usize,
    pub reference_attempts: usize,
    pub subgroup_attempts: usize,
    pub min_points_in_reference: usize,
    pub min_subgroup_points_in_reference: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Scale the attempt budget by the difficulty tier
    pub adapt_attempts_to_difficulty: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target_cpk: DEFAULT_TARGET_CPK,
            cpk_window: DEFAULT_CPK_WINDOW,
            standard_attempts: DEFAULT_STANDARD_ATTEMPTS,
            reference_attempts: DEFAULT_REFERENCE_ATTEMPTS,
            subgroup_attempts: SUBGROUP_ATTEMPTS,
            min_points_in_reference: MIN_POINTS_IN_REFERENCE,
            min_subgroup_points_in_reference: MIN_SUBGROUP_POINTS_IN_REFERENCE,
            seed: None,
            adapt_attempts_to_difficulty: false,
        }
    }
}

/// One config file; absent keys leave the lower layer alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    target_cpk: Option<f64>,
    cpk_window: Option<f64>,
    standard_attempts: Option<usize>,
    reference_attempts: Option<usize>,
    subgroup_attempts: Option<usize>,
    min_points_in_reference: Option<usize>,
    min_subgroup_points_in_reference: Option<usize>,
    seed: Option<u64>,
    adapt_attempts_to_difficulty: Option<bool>,
}

impl GeneratorConfig {
    /// Resolve all file layers; `explicit` must exist, the others are optional
    pub fn load(explicit: Option<&Path>) -> Result<Self, YamlError> {
        let mut config = Self::default();
        for path in [user_config_path(), Some(PathBuf::from(PROJECT_CONFIG_FILE))]
            .into_iter()
            .flatten()
        {
            if path.is_file() {
                config.merge_file(&path)?;
            }
        }
        if let Some(path) = explicit {
            config.merge_file(path)?;
        }
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), YamlError> {
        debug!(path = %path.display(), "loading config layer");
        let layer: Option<ConfigLayer> = parse_yaml_file(path)?;
        if let Some(layer) = layer {
            self.apply(layer);
        }
        Ok(())
    }

    fn apply(&mut self, layer: ConfigLayer) {
        self.target_cpk = layer.target_cpk.unwrap_or(self.target_cpk);
        self.cpk_window = layer.cpk_window.unwrap_or(self.cpk_window);
        self.standard_attempts = layer.standard_attempts.unwrap_or(self.standard_attempts);
        self.reference_attempts = layer.reference_attempts.unwrap_or(self.reference_attempts);
        self.subgroup_attempts = layer.subgroup_attempts.unwrap_or(self.subgroup_attempts);
        self.min_points_in_reference = layer
            .min_points_in_reference
            .unwrap_or(self.min_points_in_reference);
        self.min_subgroup_points_in_reference = layer
            .min_subgroup_points_in_reference
            .unwrap_or(self.min_subgroup_points_in_reference);
        self.adapt_attempts_to_difficulty = layer
            .adapt_attempts_to_difficulty
            .unwrap_or(self.adapt_attempts_to_difficulty);
        self.seed = layer.seed.or(self.seed);
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            cpk_window: self.cpk_window,
            subgroup_attempts: self.subgroup_attempts,
            min_points_in_reference: self.min_points_in_reference,
            min_subgroup_points_in_reference: self.min_subgroup_points_in_reference,
        }
    }
}

/// `config.yaml` in the platform config directory, if one can be determined
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spcs").map(|dirs| dirs.config_dir().join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.target_cpk, 1.8);
        assert_eq!(config.cpk_window, 0.03);
        assert_eq!(config.standard_attempts, 4000);
        assert_eq!(config.reference_attempts, 20000);
        assert!(config.seed.is_none());
        assert!(!config.adapt_attempts_to_difficulty);
    }

    #[test]
    fn test_explicit_layer_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, "target_cpk: 1.33\nseed: 99\n").unwrap();

        let mut config = GeneratorConfig::default();
        config.merge_file(&path).unwrap();
        assert_eq!(config.target_cpk, 1.33);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.standard_attempts, 4000);
    }

    #[test]
    fn test_empty_file_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "").unwrap();

        let mut config = GeneratorConfig::default();
        config.merge_file(&path).unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.yaml");
        fs::write(&path, "target_cp: 1.33\n").unwrap();

        let mut config = GeneratorConfig::default();
        assert!(config.merge_file(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(GeneratorConfig::load(Some(Path::new("/nonexistent/spcs.yaml"))).is_err());
    }

    #[test]
    fn test_search_settings_follow_config() {
        let config = GeneratorConfig {
            cpk_window: 0.05,
            subgroup_attempts: 10,
            ..Default::default()
        };
        let settings = config.search_settings();
        assert_eq!(settings.cpk_window, 0.05);
        assert_eq!(settings.subgroup_attempts, 10);
    }
}
