use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cleaning::DEFAULT_STRIP_CHARACTERS;
use crate::dataset::{Encoding, default_drop_list};
use crate::roles::DEFAULT_SECOND_LEG_START;

const CONFIG_ENV: &str = "LALIGA_FEATURES_CONFIG";
const DATA_DIR_ENV: &str = "LALIGA_FEATURES_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub strip_characters: String,
    pub result_team_columns: Vec<String>,
    pub snapshot_team_columns: Vec<String>,
    pub fold_diacritics: bool,
    /// Alternative spelling -> canonical team name.
    pub team_aliases: BTreeMap<String, String>,
    pub second_leg_start: u32,
    pub drop_features: Vec<String>,
    pub categorical_encoding: Encoding,
    pub test_fraction: f64,
    pub seed: u64,
    pub parallel: bool,
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strip_characters: DEFAULT_STRIP_CHARACTERS.to_string(),
            result_team_columns: vec!["team_1".to_string(), "team_2".to_string()],
            snapshot_team_columns: vec!["team".to_string()],
            fold_diacritics: true,
            team_aliases: BTreeMap::new(),
            second_leg_start: DEFAULT_SECOND_LEG_START,
            drop_features: default_drop_list(),
            categorical_encoding: Encoding::OneHot,
            test_fraction: 0.2,
            seed: 42,
            parallel: false,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read pipeline config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid pipeline config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize pipeline config")?;
        fs::write(&tmp, json).context("write pipeline config")?;
        fs::rename(&tmp, path).context("swap pipeline config")?;
        Ok(())
    }

    /// Reads `.env`, then the config file named by `LALIGA_FEATURES_CONFIG` when
    /// set; `LALIGA_FEATURES_DATA_DIR` overrides the output directory.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.trim().is_empty()
        {
            cfg.data_dir = PathBuf::from(dir.trim());
        }
        Ok(cfg)
    }
}
