//! Flag-aware profile resolution: layers `GlobalOpts` over the shared
//! `aquila-config` profiles and produces the `HubConfig` plus the session
//! file to use.

use std::path::PathBuf;
use std::time::Duration;

use aquila_config::{Config, Profile};
use aquila_core::{HubConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything needed to open a hub for one invocation.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub hub: HubConfig,
    pub session_file: PathBuf,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the hub settings from the config file, profile, and CLI overrides.
///
/// Without a matching profile, `--hub` alone is enough; every other
/// setting takes its default.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let profile = cfg.profiles.get(&profile_name);

    if profile.is_none() && global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // Hub URL: flag > env > profile
    let base = match (profile, global.hub.as_deref()) {
        (Some(p), Some(url)) => Profile {
            hub: url.to_owned(),
            ..p.clone()
        },
        (Some(p), None) => p.clone(),
        (None, Some(url)) => Profile::for_hub(url),
        (None, None) => {
            return Err(CliError::NoConfig {
                path: aquila_config::config_path().display().to_string(),
            });
        }
    };

    let mut hub = aquila_config::profile_to_hub_config(&base, &cfg.defaults)?;
    if global.insecure {
        hub.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        hub.timeout = Duration::from_secs(secs);
    }

    let session_file = global
        .session_file
        .clone()
        .unwrap_or_else(|| aquila_config::session_path(&profile_name, profile));

    Ok(Resolved {
        profile_name,
        hub,
        session_file,
    })
}
