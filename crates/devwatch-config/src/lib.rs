//! Shared configuration for devwatch apps.
//!
//! TOML config file merged with `DEVWATCH_*` environment overrides,
//! identity API key resolution (env + keyring + plaintext), persisted
//! session tokens, file-backed preferences, and logging setup. Translates
//! everything into a ready [`SessionController`].

pub mod credentials;
pub mod logging;
pub mod preferences;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use devwatch_api::{IdentityEndpoints, RestIdentityProvider, TransportConfig};
use devwatch_core::{ClientConfig, CoreError, SessionController};

pub use credentials::{clear_refresh_token, load_refresh_token, restore_session, save_session};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use preferences::FilePreferenceStore;

const KEYRING_SERVICE: &str = "devwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no identity API key configured")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Device API base URL (e.g. "https://api.example.com/v1/").
    pub api_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout: default_timeout(),
            identity: IdentityConfig::default(),
            refresh: RefreshConfig::default(),
            log: LogConfig::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Base URL of `accounts:*` calls.
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,

    /// Base URL of the token refresh call.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Identity API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            accounts_url: default_accounts_url(),
            token_url: default_token_url(),
            api_key: None,
            api_key_env: None,
        }
    }
}

fn default_accounts_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".into()
}
fn default_token_url() -> String {
    "https://securetoken.googleapis.com/v1".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Background poll period. `0` disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Entries requested per event history fetch.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_poll_interval() -> u64 {
    devwatch_core::config::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_history_limit() -> u32 {
    50
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "devwatch", "devwatch")
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("devwatch");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where local preferences (UI language, ...) are stored.
pub fn preferences_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share").join("preferences.toml"),
        |dirs| dirs.data_dir().join("preferences.toml"),
    )
}

/// Default log file location.
pub fn log_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".cache").join("devwatch.log"),
        |dirs| dirs.cache_dir().join("devwatch.log"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, with `DEVWATCH_*` env vars layered on top.
///
/// Nested keys use a double underscore:
/// `DEVWATCH_REFRESH__POLL_INTERVAL_SECS=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DEVWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Resolve the identity API key from the credential chain.
pub fn resolve_identity_api_key(cfg: &IdentityConfig) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, "identity/api-key") {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = cfg.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials)
}

/// Identity service endpoints from config.
pub fn identity_endpoints(cfg: &IdentityConfig) -> Result<IdentityEndpoints, ConfigError> {
    Ok(IdentityEndpoints {
        accounts_url: parse_url("identity.accounts_url", &cfg.accounts_url)?,
        token_url: parse_url("identity.token_url", &cfg.token_url)?,
    })
}

/// Build a [`ClientConfig`] from the file settings.
pub fn to_client_config(cfg: &Config) -> Result<ClientConfig, ConfigError> {
    let raw = cfg.api_url.as_deref().ok_or_else(|| ConfigError::Validation {
        field: "api_url".into(),
        reason: "not set".into(),
    })?;
    let mut api_url = parse_url("api_url", raw)?;
    // Relative endpoint paths are joined onto the base.
    if !api_url.path().ends_with('/') {
        let path = format!("{}/", api_url.path());
        api_url.set_path(&path);
    }

    let mut client = ClientConfig::new(api_url);
    client.timeout = Duration::from_secs(cfg.timeout);
    client.poll_interval = Duration::from_secs(cfg.refresh.poll_interval_secs);
    client.history_limit = cfg.refresh.history_limit;
    Ok(client)
}

/// Wire up a [`SessionController`] from config: identity provider, file
/// preferences, and HTTP settings. No network traffic happens here.
pub fn build_session(cfg: &Config) -> Result<SessionController, ConfigError> {
    let client = to_client_config(cfg)?;
    let api_key = resolve_identity_api_key(&cfg.identity)?;
    let endpoints = identity_endpoints(&cfg.identity)?;

    let transport = TransportConfig::default().with_timeout(client.timeout);
    let identity = RestIdentityProvider::new(endpoints, api_key, &transport)
        .map_err(CoreError::from)?;
    let preferences = FilePreferenceStore::open(preferences_path())?;

    Ok(SessionController::new(
        client,
        Arc::new(identity),
        Arc::new(preferences),
    )?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_fill_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"https://api.example.com/v1\"\n").unwrap();

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.timeout, 30);
        assert_eq!(cfg.refresh.poll_interval_secs, 300);
        assert_eq!(cfg.identity.token_url, default_token_url());
        assert_eq!(cfg.log.format, LogFormat::Text);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.api_url.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config {
            api_url: Some("https://api.example.com/v1/".into()),
            ..Config::default()
        };
        cfg.refresh.poll_interval_secs = 60;

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.api_url, cfg.api_url);
        assert_eq!(loaded.refresh.poll_interval_secs, 60);
    }

    #[test]
    fn client_config_normalizes_base_path() {
        let cfg = Config {
            api_url: Some("https://api.example.com/v1".into()),
            timeout: 10,
            ..Config::default()
        };

        let client = to_client_config(&cfg).unwrap();

        assert_eq!(client.api_url.as_str(), "https://api.example.com/v1/");
        assert_eq!(client.timeout, Duration::from_secs(10));
        assert_eq!(client.poll_interval, Duration::from_secs(300));
    }

    #[test]
    fn client_config_requires_valid_url() {
        let missing = to_client_config(&Config::default()).unwrap_err();
        assert!(matches!(missing, ConfigError::Validation { ref field, .. } if field == "api_url"));

        let bad = Config {
            api_url: Some("not a url".into()),
            ..Config::default()
        };
        assert!(matches!(
            to_client_config(&bad),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_poll_interval_disables_polling() {
        let mut cfg = Config {
            api_url: Some("https://api.example.com/".into()),
            ..Config::default()
        };
        cfg.refresh.poll_interval_secs = 0;
        assert!(to_client_config(&cfg).unwrap().poll_interval.is_zero());
    }
}
