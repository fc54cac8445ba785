//! CLI configuration: thin wrapper around `fleetpulse_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--profile, --server, --token).

use secrecy::SecretString;

use fleetpulse_core::SyncConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use fleetpulse_config::{Config, Profile, config_path, load_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Build the runtime `SyncConfig`. Flags take priority over the profile;
/// without a profile, `--server` alone is enough.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profile(&profile_name) {
        Ok(profile) => profile.clone(),
        Err(_) if global.profile.is_some() && global.server.is_none() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        Err(_) => Profile {
            server: global.server.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?,
            ..Profile::default()
        },
    };
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }

    let sync = match global.token {
        Some(ref token) => profile
            .to_sync_config(&cfg.defaults)?
            .with_credential(SecretString::from(token.clone())),
        None => fleetpulse_config::profile_to_sync_config(&profile, &profile_name, &cfg.defaults)?,
    };

    tracing::debug!(profile = %profile_name, server = %sync.origin, "resolved configuration");
    Ok(sync)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}
