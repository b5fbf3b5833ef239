use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base URL used when neither the environment nor the config file names one.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "TUDU_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Directory for the session database and log files
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: Option<String>,
  /// Request timeout applied to the HTTP client
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched list is served without a network round trip
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_secs() -> u64 {
  5 * 60
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tudu.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tudu/config.yaml
  ///
  /// A missing file is not an error; every field has a default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("tudu.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tudu").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty document deserializes to unit, not to an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Resolve the API base URL.
  ///
  /// Precedence: TUDU_API_URL, then `api.url` from the config file, then
  /// the local development default.
  pub fn api_url(&self) -> String {
    resolve_api_url(std::env::var(API_URL_ENV).ok(), self.api.url.as_deref())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.cache.stale_secs)
  }

  /// Directory holding `session.db` and `logs/`.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tudu"))
  }
}

fn resolve_api_url(env_value: Option<String>, configured: Option<&str>) -> String {
  env_value
    .filter(|v| !v.trim().is_empty())
    .or_else(|| configured.map(String::from))
    .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}
