//! Profile configuration for fleetpulse.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `fleetpulse_core::SyncConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetpulse_core::{BackoffPolicy, SyncConfig};

/// Keyring service name; entries are keyed `<profile>/token`.
pub const KEYRING_SERVICE: &str = "fleetpulse";

/// Environment prefix. Nested keys use `__`, e.g.
/// `FLEETPULSE_PROFILES__DEFAULT__SERVER`.
pub const ENV_PREFIX: &str = "FLEETPULSE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Profile name to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Log output: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

fn default_log_format() -> String {
    "text".into()
}
fn default_heartbeat_secs() -> u64 {
    30
}

/// A named server profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Dashboard origin (e.g., "https://fleet.example.com").
    pub server: String,

    /// Bearer token (plaintext, prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable name containing the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,

    /// Override the heartbeat period. 0 disables pings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_base_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_cap_ms: Option<u64>,
}

impl Profile {
    /// Runtime config for this profile, without a credential.
    pub fn to_sync_config(&self, defaults: &Defaults) -> Result<SyncConfig, ConfigError> {
        let origin: url::Url = self.server.parse().map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", self.server),
        })?;

        let mut config = SyncConfig::new(origin);
        if let Some(ref path) = self.socket_path {
            config.socket_path.clone_from(path);
        }
        config.heartbeat_interval =
            Duration::from_secs(self.heartbeat_secs.unwrap_or(defaults.heartbeat_secs));

        let base = self
            .backoff_base_ms
            .map_or(config.backoff.initial_delay, Duration::from_millis);
        let cap = self
            .backoff_cap_ms
            .map_or(config.backoff.max_delay, Duration::from_millis);
        config.backoff = BackoffPolicy::new(base, cap);

        config.validate().map_err(|e| ConfigError::Validation {
            field: "profile".into(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "fleetpulse", "fleetpulse").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetpulse");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file + environment. A missing file yields the
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
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

// ── Credential resolution ───────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

/// Resolve the bearer token: `token_env` → keyring → plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_token_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |name| {
            keyring::Entry::new(KEYRING_SERVICE, &keyring_user(name))
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(val) = profile.token_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.set_password(token.expose_secret()))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Build a `SyncConfig` from a profile with its resolved credential.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let config = profile.to_sync_config(defaults)?;
    let token = resolve_token(profile, profile_name)?;
    Ok(config.with_credential(token))
}

// ── Tests ───────────────────────────────────────────────────────────
