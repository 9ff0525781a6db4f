use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::categorizer::ClassifierConfig;
use crate::error::{Result, SpendError};
use crate::reconciler::ReconcilerConfig;

/// Overrides the config directory (and the default data directory beneath it).
pub const HOME_ENV: &str = "SPENDWISE_HOME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub report_recipient: Option<String>,
    #[serde(default = "default_top_merchants")]
    pub top_merchants: usize,
    #[serde(default = "default_summary_window_days")]
    pub summary_window_days: u32,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

fn default_user_id() -> String {
    "default".to_string()
}

fn default_top_merchants() -> usize {
    5
}

fn default_summary_window_days() -> u32 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_id: default_user_id(),
            report_recipient: None,
            top_merchants: default_top_merchants(),
            summary_window_days: default_summary_window_days(),
            classifier: ClassifierConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join("spendwise.db")
    }
}

fn config_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("spendwise")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    if std::env::var_os(HOME_ENV).is_some_and(|v| !v.is_empty()) {
        return config_dir().join("data");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("spendwise")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SpendError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user_id: "alice".to_string(),
            report_recipient: Some("alice@example.com".to_string()),
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.user_id, "default");
        assert_eq!(s.top_merchants, 5);
        assert_eq!(s.classifier.rule_confidence, 80);
        assert_eq!(s.classifier.entity_confidence_floor, 60);
        assert_eq!(s.reconciler.review_threshold, 70);
        assert_eq!(s.reconciler.large_amount, dec!(999999.99));
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "reconciler": {"review_threshold": 85}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.user_id, "default");
        assert_eq!(s.reconciler.review_threshold, 85);
        assert_eq!(s.reconciler.merchant_penalty, 20);
        assert!(s.classifier.entity_fallback);
    }

    #[test]
    fn test_db_path_under_data_dir() {
        let s = Settings { data_dir: "/tmp/sw".to_string(), ..Settings::default() };
        assert_eq!(s.db_path(), PathBuf::from("/tmp/sw/spendwise.db"));
    }
}
