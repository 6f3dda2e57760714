use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{ConfigError, TableError};
use crate::helper_functions::resolve_path;
use crate::integrations::SearchParams;
use crate::prediction_tools::candidate_scanner::ScanOptions;
use crate::prediction_tools::mismatch_decoder::DeletionPolicy;
use crate::prediction_tools::weight_tables::ScoringModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlignerSettings {
    /// `bowtie2` binary; looked up on PATH when unset.
    pub executable: Option<PathBuf>,
    /// Bowtie2 index prefix (`-x`).
    pub index: Option<PathBuf>,
    /// Command the aligner is run through, e.g. `wsl`.
    pub launcher: Option<String>,
    pub search: SearchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimerSettings {
    pub enabled: bool,
    /// `primer3_core` binary; looked up on PATH when unset.
    pub executable: Option<PathBuf>,
    pub opt_size: u32,
    pub product_size_min: u32,
    pub product_size_max: u32,
    pub min_tm: f64,
    pub max_tm: f64,
}

impl Default for PrimerSettings {
    fn default() -> Self {
        PrimerSettings {
            enabled: true,
            executable: None,
            opt_size: 20,
            product_size_min: 150,
            product_size_max: 300,
            min_tm: 57.0,
            max_tm: 63.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub aligner: AlignerSettings,
    pub primers: PrimerSettings,
    pub scan: ScanOptions,
    pub deletion_policy: DeletionPolicy,
    /// JSON weight tables replacing the built-in Doench/CFD tables.
    pub weights_path: Option<PathBuf>,
    /// Worker threads for candidate scoring; rayon's default when unset.
    pub threads: Option<usize>,
    /// Bases added on each side of a region before scanning it.
    pub region_padding: u64,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(&EngineConfig::default()).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn scoring_model(&self) -> Result<ScoringModel, TableError> {
        match &self.weights_path {
            Some(path) => ScoringModel::from_json_file(&resolve_path(path)),
            None => ScoringModel::standard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        EngineConfig::write_default(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "aligner": { "index": "/data/R570/R570_index", "launcher": "wsl" },
                "deletion_policy": "reference_coordinates",
                "scan": { "gc_window": [30.0, 80.0] },
                "threads": 4
            }"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.aligner.index, Some(PathBuf::from("/data/R570/R570_index")));
        assert_eq!(config.aligner.launcher.as_deref(), Some("wsl"));
        assert_eq!(config.aligner.search, SearchParams::default());
        assert_eq!(config.deletion_policy, DeletionPolicy::ReferenceCoordinates);
        assert!(config.scan.require_context);
        assert_eq!(config.scan.gc_window, Some((30.0, 80.0)));
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.primers, PrimerSettings::default());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn built_in_tables_without_weights_path() {
        let model = EngineConfig::default().scoring_model().unwrap();
        assert_eq!(model, ScoringModel::standard().unwrap());
    }
}
