//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod maintenance;
pub mod service;
pub mod session;
pub mod util;
pub mod watch;

use aquila_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
///
/// Everything except the session commands first navigates to the home
/// view, so an anonymous invocation fails before touching the network.
pub async fn dispatch(
    cmd: Command,
    hub: &Hub,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => session::login(hub, args, global).await,
        Command::Logout => session::logout(hub, global),
        Command::Whoami => session::whoami(hub, profile, global),

        Command::Devices(args) => {
            util::require_session(hub, profile)?;
            devices::handle(hub, args, global).await
        }
        Command::State(args) => {
            util::require_session(hub, profile)?;
            service::state(hub, args, global).await
        }
        Command::Set(args) => {
            util::require_session(hub, profile)?;
            service::set(hub, args, global).await
        }
        Command::Toggle(args) => {
            util::require_session(hub, profile)?;
            service::toggle(hub, args, global).await
        }
        Command::Watch(args) => {
            util::require_session(hub, profile)?;
            watch::handle(hub, args, global).await
        }
        Command::Reload => {
            util::require_session(hub, profile)?;
            maintenance::reload(hub, global).await
        }
        Command::Discover => {
            util::require_session(hub, profile)?;
            maintenance::discover(hub, global).await
        }

        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
