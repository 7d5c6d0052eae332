use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::provenance::DEFAULT_MIN_MATCH_LEN;
use crate::scoring::WeightTable;
use crate::typing::TypingRules;

/// Session configuration: scoring weights, gating thresholds, collaborator
/// endpoints and the export directory. Persisted as JSON under the data
/// directory so study operators can tune the model between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HesConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub weights: WeightTable,

    #[serde(default)]
    pub typing: TypingRules,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub model: ModelConfig,

    /// Submission notification endpoint. Absent means local export only.
    #[serde(default)]
    pub notify_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Shortest draft segment counted as an AI match, in characters.
    #[serde(default = "default_min_match_len")]
    pub min_match_len: usize,
    /// Feedback requires strictly more words than this.
    #[serde(default = "default_feedback_min_words")]
    pub feedback_min_words: usize,
    /// Feedback requires at least this much textual change since the last
    /// request, in percent.
    #[serde(default = "default_feedback_min_change_pct")]
    pub feedback_min_change_pct: u32,
    /// Per-panel scroll counting window.
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: i64,
    /// Quiet period before the similarity-dependent figures recompute.
    #[serde(default = "default_similarity_debounce_ms")]
    pub similarity_debounce_ms: u64,
    /// Periodic time-tick interval.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_match_len: default_min_match_len(),
            feedback_min_words: default_feedback_min_words(),
            feedback_min_change_pct: default_feedback_min_change_pct(),
            scroll_throttle_ms: default_scroll_throttle_ms(),
            similarity_debounce_ms: default_similarity_debounce_ms(),
            tick_secs: default_tick_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_url")]
    pub base_url: String,
    #[serde(default = "default_model_name")]
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_url(),
            model: default_model_name(),
        }
    }
}

// Defaults
fn default_min_match_len() -> usize {
    DEFAULT_MIN_MATCH_LEN
}
fn default_feedback_min_words() -> usize {
    30
}
fn default_feedback_min_change_pct() -> u32 {
    10
}
fn default_scroll_throttle_ms() -> i64 {
    100
}
fn default_similarity_debounce_ms() -> u64 {
    800
}
fn default_tick_secs() -> u64 {
    5
}
fn default_model_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_model_name() -> String {
    "gemma3:27b".to_string()
}
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".hes"))
        .unwrap_or_else(|| PathBuf::from(".hes"))
}

impl Default for HesConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            weights: WeightTable::default(),
            typing: TypingRules::default(),
            thresholds: Thresholds::default(),
            model: ModelConfig::default(),
            notify_url: None,
        }
    }
}

impl HesConfig {
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("hes.json");

        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {config_path:?}"))?;
            let mut config: HesConfig =
                serde_json::from_str(&raw).context("Failed to parse config")?;
            config.data_dir = data_dir.to_path_buf();
            config.validate()?;
            return Ok(config);
        }

        let config = Self {
            data_dir: data_dir.to_path_buf(),
            ..Self::default()
        };
        config.persist()?;
        Ok(config)
    }

    pub fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create data dir: {:?}", self.data_dir))?;
        let config_path = self.data_dir.join("hes.json");
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(config_path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        Ok(())
    }

    /// Directory the submission artifact is exported to.
    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        HesConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_creates_and_persists_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = HesConfig::load_or_default(tmp.path()).unwrap();
        assert!(tmp.path().join("hes.json").exists());
        assert_eq!(config.thresholds.feedback_min_words, 30);

        // Second load round-trips the persisted file.
        let again = HesConfig::load_or_default(tmp.path()).unwrap();
        assert_eq!(again.thresholds.min_match_len, config.thresholds.min_match_len);
    }

    #[test]
    fn test_invalid_weights_rejected_on_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = HesConfig::load_or_default(tmp.path()).unwrap();
        config.weights.draft_similarity = 1.0;
        config.persist().unwrap();
        assert!(HesConfig::load_or_default(tmp.path()).is_err());
    }
}
