use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/connections.json";
pub const DEFAULT_API_BASE_URL: &str = "https://tasks.app.rs.school/angular";
pub const DEFAULT_DATABASE_PATH: &str = "data/connections.db";
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

const ENV_API_URL: &str = "CONNECTIONS_API_URL";
const ENV_TOKEN: &str = "CONNECTIONS_TOKEN";
const ENV_UID: &str = "CONNECTIONS_UID";
const ENV_EMAIL: &str = "CONNECTIONS_EMAIL";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Minimum seconds between two accepted list refreshes.
    #[serde(default = "default_cooldown")]
    pub list_cooldown_secs: u64,
    /// Minimum seconds between two accepted message refreshes of one thread.
    #[serde(default = "default_cooldown")]
    pub thread_cooldown_secs: u64,
    /// Length of the countdown shown after a refresh.
    #[serde(default = "default_cooldown")]
    pub countdown_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            database_path: default_database_path(),
            list_cooldown_secs: DEFAULT_COOLDOWN_SECS,
            thread_cooldown_secs: DEFAULT_COOLDOWN_SECS,
            countdown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

impl AppConfig {
    pub fn list_cooldown(&self) -> Duration {
        Duration::from_secs(self.list_cooldown_secs)
    }

    pub fn thread_cooldown(&self) -> Duration {
        Duration::from_secs(self.thread_cooldown_secs)
    }
}

/// Credentials attached to every backend request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub uid: String,
    pub email: String,
}

impl Session {
    /// Read the session from `CONNECTIONS_TOKEN`, `CONNECTIONS_UID` and
    /// `CONNECTIONS_EMAIL`. Missing variables become empty strings.
    pub fn from_env() -> Self {
        let read = |name: &str| env::var(name).unwrap_or_default();
        let session = Self {
            token: read(ENV_TOKEN),
            uid: read(ENV_UID),
            email: read(ENV_EMAIL),
        };
        if session.token.is_empty() {
            log::warn!("{ENV_TOKEN} is not set; requests will be sent unauthenticated");
        }
        session
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    let mut config = match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    };

    if let Ok(url) = env::var(ENV_API_URL) {
        if !url.trim().is_empty() {
            config.api_base_url = url;
        }
    }
    config
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.list_cooldown_secs, 60);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");
        fs::write(&path, r#"{"thread_cooldown_secs": 15}"#).unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.thread_cooldown(), Duration::from_secs(15));
        assert_eq!(config.list_cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.countdown_secs, DEFAULT_COOLDOWN_SECS);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/connections.json");
        let path = path.to_str().unwrap();
        let config = AppConfig {
            list_cooldown_secs: 5,
            ..AppConfig::default()
        };

        save_config(path, &config).unwrap();
        assert_eq!(load_config(path).list_cooldown_secs, 5);
    }
}
