use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

const CONFIG_ENV: &str = "PAGEBRIDGE_CONFIG";
const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_START_ANIMATION: &str = "startAnimationProcess";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// What to do with inbound text that is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlainTextFallback {
    /// Append the raw text to the status log.
    Status,
    /// Log it and drop it.
    Ignore,
}

impl Default for PlainTextFallback {
    fn default() -> Self {
        Self::Status
    }
}

/// Ids of the well-known elements the appliers write into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementIds {
    pub status_log: String,
    pub spinner: String,
    pub theme: String,
    pub notification_host: String,
    pub header: String,
    pub footer: String,
    pub status: String,
    pub aside: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            status_log: "status-content".into(),
            spinner: "spinner-container".into(),
            theme: "theme-styles".into(),
            notification_host: "main".into(),
            header: "header".into(),
            footer: "footer".into(),
            status: "status".into(),
            aside: "aside".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub elements: ElementIds,
    pub plain_text_fallback: PlainTextFallback,
    /// Also write snackbar text to the status log.
    pub snackbar_mirrors_status: bool,
    pub start_animation_procedure: String,
    pub snapshot_path: Option<PathBuf>,
    pub session_id: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            elements: ElementIds::default(),
            plain_text_fallback: PlainTextFallback::default(),
            snackbar_mirrors_status: false,
            start_animation_procedure: DEFAULT_START_ANIMATION.into(),
            snapshot_path: None,
            session_id: None,
        }
    }
}

impl BridgeConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `$PAGEBRIDGE_CONFIG`, falling back to the per-user config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("", "", "pagebridge").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn session_id(&self) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.elements.status_log, "status-content");
        assert_eq!(config.plain_text_fallback, PlainTextFallback::Status);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config =
            BridgeConfig::load(Some(PathBuf::from("/nonexistent/pagebridge.yaml"))).unwrap();
        assert_eq!(config.start_animation_procedure, "startAnimationProcess");
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(
            file,
            "plain_text_fallback: ignore\nsnackbar_mirrors_status: true\nelements:\n  theme: dark-theme\nsession_id: S1"
        )
        .unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.plain_text_fallback, PlainTextFallback::Ignore);
        assert!(config.snackbar_mirrors_status);
        assert_eq!(config.elements.theme, "dark-theme");
        assert_eq!(config.elements.spinner, "spinner-container");
        assert_eq!(config.session_id(), "S1");
    }

    #[test]
    fn rejects_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "plain_text_fallback: [not, a, mode]").unwrap();
        let err = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn generated_session_ids_are_unique() {
        let config = BridgeConfig::default();
        assert_ne!(config.session_id(), config.session_id());
    }
}
