//! Hub maintenance triggers.

use aquila_core::Hub;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn reload(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    hub.session().reload().await?;
    output::print_output("Hub configuration reload requested", global.quiet);
    Ok(())
}

pub async fn discover(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    hub.session().discover().await?;
    output::print_output("Device discovery requested", global.quiet);
    Ok(())
}
