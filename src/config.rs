use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::query::CacheOptions;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub views: ViewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Used when no environment is selected
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Name of an entry in `environments`
  pub environment: Option<String>,
  /// Named base URLs, e.g. staging and production
  #[serde(default)]
  pub environments: BTreeMap<String, String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      environment: None,
      environments: BTreeMap::new(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ApiConfig {
  /// Base URL of the selected environment, or `base_url` if none is selected.
  pub fn resolved_base_url(&self) -> Result<&str> {
    match &self.environment {
      None => Ok(&self.base_url),
      Some(name) => self.environments.get(name).map(String::as_str).ok_or_else(|| {
        let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
        eyre!(
          "Unknown environment '{}'. Configured environments: {}",
          name,
          if known.is_empty() {
            "none".to_string()
          } else {
            known.join(", ")
          }
        )
      }),
    }
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  #[serde(default = "default_gc_time_secs")]
  pub gc_time_secs: u64,
}

fn default_stale_time_secs() -> u64 {
  60
}

fn default_gc_time_secs() -> u64 {
  300
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
      gc_time_secs: default_gc_time_secs(),
    }
  }
}

impl CacheConfig {
  pub fn options(&self) -> CacheOptions {
    CacheOptions {
      stale_time: Duration::from_secs(self.stale_time_secs),
      gc_time: Duration::from_secs(self.gc_time_secs),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

fn default_page_size() -> usize {
  25
}

impl Default for ViewsConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
    }
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./bizdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bizdesk/config.yaml
  ///
  /// With no file found the defaults are used.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        debug!("no config file found, using defaults");
        Config::default()
      }
    };
    if let Ok(env) = std::env::var("BIZDESK_ENV") {
      config.api.environment = Some(env);
    }
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("bizdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bizdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Session token override from the environment.
  ///
  /// Checks BIZDESK_TOKEN. An empty value counts as unset.
  pub fn env_token() -> Option<String> {
    std::env::var("BIZDESK_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_for_empty_file() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.resolved_base_url().unwrap(), DEFAULT_BASE_URL);
    assert_eq!(config.cache.options(), CacheOptions::default());
    assert_eq!(config.views.page_size, 25);
  }

  #[test]
  fn test_environment_selects_base_url() {
    let config = Config::parse(
      r#"
api:
  base_url: https://api.example.com/api/v1
  environment: staging
  environments:
    staging: https://staging.example.com/api/v1
cache:
  stale_time_secs: 5
"#,
    )
    .unwrap();
    assert_eq!(
      config.api.resolved_base_url().unwrap(),
      "https://staging.example.com/api/v1"
    );
    assert_eq!(config.cache.options().stale_time, Duration::from_secs(5));
    assert_eq!(config.cache.gc_time_secs, 300);
  }

  #[test]
  fn test_unknown_environment_is_an_error() {
    let mut config = Config::default();
    config.api.environment = Some("prod".to_string());
    let err = config.api.resolved_base_url().unwrap_err();
    assert!(err.to_string().contains("Unknown environment 'prod'"));
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bizdesk.yaml");
    std::fs::write(&path, "views:\n  page_size: 10\n").unwrap();
    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.views.page_size, 10);

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}
