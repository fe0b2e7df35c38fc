use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::TaskOrder;

/// Name of the environment variable whose value, when set, is accepted as an
/// additional API key. Lets deployments inject a secret without writing it
/// into the config file.
pub const API_KEY_ENV: &str = "TASKDESK_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Storage backend selection. The two backends implement the same store port
/// and are interchangeable; `task_order` applies to both.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file (sqlite backend).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Directory holding tasks.json / notes.json / people.json (json backend).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub task_order: TaskOrder,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Json,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/taskdesk.sqlite")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9000".to_string()
}

/// Static credentials accepted by the API. Supplied entirely through
/// configuration (or the [`API_KEY_ENV`] environment variable) — never baked
/// into source.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub users: Vec<UserCredential>,
}

impl AuthConfig {
    pub fn is_empty(&self) -> bool {
        self.api_keys.is_empty() && self.users.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserCredential {
    pub username: String,
    /// Hex-encoded SHA-256 of the password.
    pub password_sha256: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.auth.api_keys.push(key);
        }
    }

    // Validate auth
    if config.auth.api_keys.iter().any(|k| k.trim().is_empty()) {
        anyhow::bail!("auth.api_keys must not contain empty keys");
    }
    for user in &config.auth.users {
        if user.username.trim().is_empty() {
            anyhow::bail!("auth.users entries must have a username");
        }
        let hash = &user.password_sha256;
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!(
                "auth.users entry '{}': password_sha256 must be a 64-character hex SHA-256 digest",
                user.username
            );
        }
    }

    // Validate server
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}
