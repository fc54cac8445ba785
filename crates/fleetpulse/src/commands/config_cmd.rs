//! Config subcommand handlers.

use std::io::{self, BufRead};

use secrecy::SecretString;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Socket")]
    socket: String,
    #[tabled(rename = "Token")]
    token: String,
}

fn token_source(profile: &Profile) -> String {
    match (&profile.token_env, &profile.token) {
        (Some(var), _) => format!("env:{var}"),
        (None, Some(_)) => "plaintext (redacted)".into(),
        (None, None) => "keyring".into(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_line(&config::config_path().display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    marker: if *name == active { "*" } else { "" },
                    name: name.clone(),
                    server: p.server.clone(),
                    socket: p
                        .socket_path
                        .clone()
                        .unwrap_or_else(|| fleetpulse_core::config::DEFAULT_SOCKET_PATH.into()),
                    token: token_source(p),
                })
                .collect();

            if rows.is_empty() {
                eprintln!("No profiles in {}", config::config_path().display());
            } else {
                output::print_line(&output::render_table(&rows));
            }
            eprintln!(
                "log format: {}, heartbeat: {}s",
                cfg.defaults.log_format, cfg.defaults.heartbeat_secs
            );
            Ok(())
        }

        ConfigCommand::SetToken { stdin } => {
            let cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);

            let token = if stdin {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                line.trim().to_owned()
            } else {
                rpassword::prompt_password(format!("Token for '{profile_name}': "))?
            };
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }

            fleetpulse_config::store_token(&profile_name, &SecretString::from(token))?;
            eprintln!("Token for '{profile_name}' stored in the system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_source_prefers_env() {
        let profile = Profile {
            server: "https://fleet.example.com".into(),
            token: Some("plain".into()),
            token_env: Some("FLEET_TOKEN".into()),
            ..Profile::default()
        };
        assert_eq!(token_source(&profile), "env:FLEET_TOKEN");
    }

    #[test]
    fn token_source_never_prints_plaintext() {
        let profile = Profile {
            token: Some("hunter2".into()),
            ..Profile::default()
        };
        assert!(!token_source(&profile).contains("hunter2"));
        assert_eq!(token_source(&Profile::default()), "keyring");
    }
}
