//! Config subcommand handlers.

use dialoguer::Input;

use aquila_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const DEFAULT_HUB_URL: &str = "http://localhost:8080/api/";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            name,
            hub_url,
            keep_default,
        } => init(name, hub_url, keep_default, global),

        ConfigCommand::Show => {
            let cfg = aquila_config::load_config()?;
            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(|e| CliError::Validation {
                        field: "config".into(),
                        reason: format!("failed to serialize config: {e}"),
                    })?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &aquila_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}

/// Add or replace a profile. Values not given as flags are prompted for.
fn init(
    name: Option<String>,
    hub_url: Option<String>,
    keep_default: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let path = aquila_config::config_path();
    let mut cfg = aquila_config::load_config()?;

    let name = match name {
        Some(name) => name,
        None => Input::<String>::new()
            .with_prompt("Profile name")
            .default("default".into())
            .interact_text()
            .map_err(prompt_err)?,
    };
    if name.trim().is_empty() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "profile name cannot be empty".into(),
        });
    }

    let hub = match hub_url {
        Some(url) => url,
        None => Input::<String>::new()
            .with_prompt("Hub API root")
            .default(DEFAULT_HUB_URL.into())
            .interact_text()
            .map_err(prompt_err)?,
    };

    let profile = Profile::for_hub(hub);
    // Fail before writing anything the loader would later reject
    aquila_config::profile_to_hub_config(&profile, &cfg.defaults)?;

    let replaced = cfg.profiles.insert(name.clone(), profile).is_some();
    if !keep_default || cfg.default_profile.is_none() {
        cfg.default_profile = Some(name.clone());
    }
    aquila_config::save_config(&cfg)?;

    let verb = if replaced { "Updated" } else { "Created" };
    output::print_output(
        &format!("{verb} profile '{name}' in {}", path.display()),
        global.quiet,
    );
    Ok(())
}
