use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_URL_ENV: &str = "INBOX_TRIAGE_API_URL";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub default_count: u32,
    pub max_count: u32,
    pub request_timeout_secs: u64,
    pub export_signal_ms: u64,
    pub watch_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/".to_string(),
            default_count: 5,
            max_count: 50,
            request_timeout_secs: 30,
            export_signal_ms: 1000,
            watch_interval_secs: 60,
        }
    }
}

impl Config {
    /// Batch size to request: `requested` or the default, kept in
    /// `1..=max_count`.
    pub fn batch_size(&self, requested: Option<u32>) -> u32 {
        let max = self.max_count.max(1);
        requested.unwrap_or(self.default_count).clamp(1, max)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn export_window(&self) -> Duration {
        Duration::from_millis(self.export_signal_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("inbox_triage"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Loads the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    read_or_init(&path).map(Config::apply_env)
}

fn read_or_init(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tom = toml::to_string_pretty(&Config::default())?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} — edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}
