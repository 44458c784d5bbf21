use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{DEFAULT_TIMEOUT_SECS, RestConfig};

const SETTINGS_DIR: &str = "project-board";
const SETTINGS_FILE: &str = "settings.json";

/// Connection settings, persisted as `settings.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values coming from flags or the environment; `Some` wins over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub store_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// `<config dir>/project-board/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write through a temporary file and rename, so a crash never leaves a
    /// half-written settings file behind.
    pub fn save(&self, path: &Path) -> ServiceResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension("tmp");
        let mut f = File::create(&temp)?;
        let content = serde_json::to_string_pretty(self)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
        fs::rename(temp, path)?;
        Ok(())
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if overrides.store_url.is_some() {
            self.store_url = overrides.store_url;
        }
        if overrides.api_key.is_some() {
            self.api_key = overrides.api_key;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.timeout_secs = timeout;
        }
        self
    }

    pub fn validate(&self) -> ServiceResult<()> {
        let url = self
            .store_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ServiceError::Config(
                    "no store URL; pass --url, set PROJECT_BOARD_URL or run `project-board config`"
                        .to_string(),
                )
            })?;
        if url.contains("://") && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ServiceError::Config(format!(
                "store URL '{url}' must use http or https"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ServiceError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rest_config(&self) -> ServiceResult<RestConfig> {
        self.validate()?;
        let url = self.store_url.as_deref().unwrap_or_default();
        Ok(RestConfig::new(url, self.api_key.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs)))
    }

    /// API key safe for display: first four characters, rest elided.
    pub fn masked_api_key(&self) -> String {
        match self.api_key.as_deref() {
            None | Some("") => "(none)".to_string(),
            Some(key) => {
                let visible: String = key.chars().take(4).collect();
                format!("{visible}…")
            }
        }
    }
}
