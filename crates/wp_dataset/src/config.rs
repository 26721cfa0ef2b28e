//! Dataset configuration.
//!
//! Resolution order for the dataset folder:
//! 1) `--folder` on the command line
//! 2) `WP_DATASET_DIR` if set
//! 3) `folder` from the YAML config file
//! 4) `data/csgo` (relative)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wp_core::{NavLibrary, TransformKind};

use crate::error::{DatasetError, Result};
use crate::frames::FramesLayout;
use crate::split::{Split, SplitThresholds, SplitUnit};
use crate::store;

/// Env var overriding the dataset folder.
pub const DATASET_DIR_ENV: &str = "WP_DATASET_DIR";

pub const DEFAULT_DATASET_DIR: &str = "data/csgo";
pub const DEFAULT_FRAMES_FILE: &str = "csgo_playerframes_dust2.csv";
pub const DEFAULT_ROUNDS_FILE: &str = "csgo_rounds_dust2.csv";
pub const DEFAULT_SEED: u64 = 13;
pub const NAV_DIR: &str = "nav";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Root folder holding the raw CSVs and the split directories
    pub folder: PathBuf,
    /// Frames CSV, relative to `folder`
    pub frames_file: String,
    /// Round outcomes CSV, relative to `folder`
    pub rounds_file: String,
    pub frames_layout: FramesLayout,
    /// Directory of `<map>.json` navigation meshes, `<folder>/nav` if unset
    pub nav_dir: Option<PathBuf>,
    /// Seed for split assignment
    pub seed: u64,
    pub split_unit: SplitUnit,
    pub thresholds: SplitThresholds,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_DATASET_DIR),
            frames_file: DEFAULT_FRAMES_FILE.to_string(),
            rounds_file: DEFAULT_ROUNDS_FILE.to_string(),
            frames_layout: FramesLayout::Headerless,
            nav_dir: None,
            seed: DEFAULT_SEED,
            split_unit: SplitUnit::Match,
            thresholds: SplitThresholds::default(),
        }
    }
}

impl DatasetConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self { folder: folder.into(), ..Self::default() }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| DatasetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DatasetError::FileNotFound { path: path.display().to_string() });
        }
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Applies `WP_DATASET_DIR` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var(DATASET_DIR_ENV) {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                self.folder = PathBuf::from(trimmed);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.train_below)
            || !(0.0..=1.0).contains(&t.test_above)
            || t.train_below > t.test_above
        {
            return Err(DatasetError::Config(format!(
                "split thresholds must satisfy 0 <= train_below ({}) <= test_above ({}) <= 1",
                t.train_below, t.test_above
            )));
        }
        Ok(())
    }

    pub fn frames_path(&self) -> PathBuf {
        self.folder.join(&self.frames_file)
    }

    pub fn rounds_path(&self) -> PathBuf {
        self.folder.join(&self.rounds_file)
    }

    pub fn nav_path(&self) -> PathBuf {
        self.nav_dir.clone().unwrap_or_else(|| self.folder.join(NAV_DIR))
    }

    /// Load every navigation mesh under [`Self::nav_path`].
    pub fn load_nav(&self) -> Result<NavLibrary> {
        let dir = self.nav_path();
        if !dir.exists() {
            return Err(DatasetError::FileNotFound { path: dir.display().to_string() });
        }
        Ok(NavLibrary::load_dir(&dir)?)
    }

    pub fn split_archive_path(&self, split: Split) -> PathBuf {
        store::split_archive_path(&self.folder, split)
    }

    pub fn tensor_cache_path(&self, split: Split, transform: TransformKind) -> PathBuf {
        store::tensor_cache_path(&self.folder, split, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatasetConfig::default();
        assert_eq!(config.seed, 13);
        assert_eq!(config.split_unit, SplitUnit::Match);
        assert_eq!(config.frames_path(), PathBuf::from("data/csgo/csgo_playerframes_dust2.csv"));
        assert_eq!(config.thresholds.train_below, 0.6);
        assert_eq!(config.thresholds.test_above, 0.8);
        assert_eq!(config.nav_path(), PathBuf::from("data/csgo/nav"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DatasetConfig::from_yaml_str(
            "folder: /data/csgo\nseed: 7\nsplit_unit: round\nframes_layout: headered\n",
        )
        .unwrap();
        assert_eq!(config.folder, PathBuf::from("/data/csgo"));
        assert_eq!(config.seed, 7);
        assert_eq!(config.split_unit, SplitUnit::Round);
        assert_eq!(config.frames_layout, FramesLayout::Headered);
        assert_eq!(config.rounds_file, DEFAULT_ROUNDS_FILE);
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let err = DatasetConfig::from_yaml_str("thresholds:\n  train_below: 0.9\n  test_above: 0.5\n")
            .unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)));
    }

    #[test]
    fn test_load_nav_from_default_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DatasetConfig::new(dir.path());
        assert!(matches!(config.load_nav(), Err(DatasetError::FileNotFound { .. })));

        std::fs::create_dir_all(config.nav_path()).unwrap();
        std::fs::write(
            config.nav_path().join("de_dust2.json"),
            r#"{"map": "de_dust2", "areas": [{"id": 1, "center": [0, 0, 0], "connections": [2]},
                {"id": 2, "center": [3, 4, 0]}]}"#,
        )
        .unwrap();
        let library = config.load_nav().unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.maps(), vec!["de_dust2"]);
    }

    #[test]
    fn test_missing_file() {
        let err = DatasetConfig::from_yaml_file(Path::new("/nonexistent/wp.yaml")).unwrap_err();
        assert!(matches!(err, DatasetError::FileNotFound { .. }));
    }
}
