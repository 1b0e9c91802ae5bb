//! Shared helpers for command handlers.

use aquila_core::{Device, Hub, Route};

use crate::cli::TargetArgs;
use crate::error::CliError;

/// Run the route guard for the home view; anonymous sessions are refused.
pub fn require_session(hub: &Hub, profile: &str) -> Result<(), CliError> {
    let state = hub.navigator().navigate(Route::HOME_PATH);
    if state.route == Route::Home {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn {
            profile: profile.to_owned(),
        })
    }
}

/// Device class for a command: flag, then profile.
pub fn class_for(hub: &Hub, class: Option<&str>) -> String {
    class.map_or_else(|| hub.config().sync.device_class.clone(), str::to_owned)
}

/// Service name for a command: flag, then profile.
pub fn service_for(hub: &Hub, service: Option<&str>) -> String {
    service.map_or_else(|| hub.config().sync.service.clone(), str::to_owned)
}

/// Resolve the device a command targets: the `--device` id if given,
/// otherwise the first device of the class.
pub async fn resolve_device(hub: &Hub, target: &TargetArgs) -> Result<Device, CliError> {
    let class = class_for(hub, target.class.as_deref());
    if let Some(ref id) = target.device {
        return Ok(hub.device(&class, id).await?);
    }
    hub.devices(&class)
        .await?
        .into_iter()
        .next()
        .ok_or(CliError::NoDevice { class })
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
