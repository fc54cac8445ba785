//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fleetpulse_config::ConfigError;
use fleetpulse_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NO_CREDENTIALS: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 10;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to push channel at {url}")]
    #[diagnostic(
        code(fleetpulse::connection_failed),
        help(
            "Check that the dashboard is running and reachable, and that the token is valid.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(fleetpulse::no_credentials),
        help(
            "Store a token with: fleetpulse config set-token --profile {profile}\n\
             Or set the FLEETPULSE_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("Keyring error: {reason}")]
    #[diagnostic(code(fleetpulse::keyring))]
    Keyring { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetpulse::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fleetpulse::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Add one under [profiles.{name}] in the config file, or pass --server."
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(fleetpulse::no_config),
        help(
            "Pass --server <URL>, set FLEETPULSE_SERVER, or create a profile.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(fleetpulse::config))]
    Config { message: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Sync engine stopped unexpectedly")]
    #[diagnostic(code(fleetpulse::stopped))]
    Stopped,

    #[error("Internal error: {message}")]
    #[diagnostic(code(fleetpulse::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(fleetpulse::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } => exit_code::NO_CREDENTIALS,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } | Self::Config { .. } => {
                exit_code::CONFIG
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Disconnected { code, reason } => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                source: format!("closed by server ({code}): {reason}").into(),
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::ClientStopped => CliError::Stopped,
            CoreError::Protocol { message } | CoreError::Internal(message) => {
                CliError::Internal { message }
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Keyring(reason) => CliError::Keyring { reason },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(
            CliError::NoCredentials {
                profile: "default".into()
            }
            .exit_code(),
            exit_code::NO_CREDENTIALS
        );
        assert_eq!(
            CliError::from(CoreError::ConnectionFailed {
                url: "ws://x".into(),
                reason: "refused".into()
            })
            .exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(
            CliError::NoConfig { path: "/x".into() }.exit_code(),
            exit_code::CONFIG
        );
        assert_eq!(CliError::Stopped.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_validation_is_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "server".into(),
            reason: "invalid URL".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
