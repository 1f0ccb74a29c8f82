use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sanitize::DEFAULT_SENSITIVE_KEYS;
use crate::{twlog_debug, Error, Result};

const DEFAULT_PLATFORM: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false the server surface refuses to start.
    pub enabled: bool,
    /// Platform name recorded in task manifests.
    pub platform_name: String,
    /// Regex patterns (case-insensitive) of keys whose values are masked.
    pub sensitive_keys: Vec<String>,
    /// Common application properties file; `.yml`/`.yaml` is parsed as YAML,
    /// anything else as `key=value` properties.
    pub common_properties_file: Option<String>,
    /// Lowest-precedence app properties applied to every launch.
    pub default_app_properties: BTreeMap<String, String>,
    /// Deployment properties applied to every launch.
    pub default_deployment_properties: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    pub state_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            platform_name: DEFAULT_PLATFORM.to_string(),
            sensitive_keys: DEFAULT_SENSITIVE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            common_properties_file: None,
            default_app_properties: BTreeMap::new(),
            default_deployment_properties: BTreeMap::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            state_file: None,
        }
    }
}

impl Config {
    pub fn home_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskweave"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("taskweave.toml"))
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(expand_tilde(path)),
            None => Ok(Self::home_dir()?.join("state.json")),
        }
    }

    pub fn common_properties_path(&self) -> Option<PathBuf> {
        self.common_properties_file.as_deref().map(expand_tilde)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        twlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            twlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        twlog_debug!(
            "Config loaded: enabled={}, platform={}, common_properties_file={:?}",
            config.enabled,
            config.platform_name,
            config.common_properties_file
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::home_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        twlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.platform_name.trim().is_empty() {
            return Err(Error::Config("platform_name must not be empty".to_string()));
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
