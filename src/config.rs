use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Language;

fn default_base_url() -> String {
    "http://localhost:50505".to_string()
}

fn default_feedback_enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Sent as-is; the host application produces it.
    #[serde(default)]
    pub encrypted_username: Option<String>,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
            auth_token: None,
            encrypted_username: None,
            language: Language::Fr,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig { enabled: true }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
            min_width: 480,
            min_height: 360,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            return Config::default();
        }

        match Self::read(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}. Using defaults.", e);
                Config::default()
            }
        }
    }

    pub fn read(config_path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Error reading {}", config_path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Error parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/citebar")
        } else {
            PathBuf::from(".")
        }
    }

    pub fn export_dir() -> PathBuf {
        Self::get_config_dir().join("exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[backend]\nbase_url = \"https://chat.example.org\"\nauth_token = \"abc\"\nlanguage = \"EN\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.backend.base_url, "https://chat.example.org");
        assert_eq!(config.backend.auth_token.as_deref(), Some("abc"));
        assert_eq!(config.backend.language, Language::En);
        assert!(config.feedback.enabled);
        assert_eq!(config.window.width, 900);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend\nthis is not toml").unwrap();

        let err = Config::read(&path).unwrap_err();
        assert!(format!("{:#}", err).starts_with("Error parsing"));

        let config = Config::load_from(&path);
        assert_eq!(config.backend.base_url, "http://localhost:50505");
        assert_eq!(config.backend.language, Language::Fr);
    }

    #[test]
    fn missing_file_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path);
        assert!(path.parent().unwrap().exists());
        assert!(config.backend.auth_token.is_none());
    }
}
