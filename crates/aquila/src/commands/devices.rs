//! Device listing.

use tabled::Tabled;

use aquila_core::{Device, Hub};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            class: d.class.clone(),
            name: d.name().unwrap_or("-").to_owned(),
        }
    }
}

pub async fn handle(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let class = util::class_for(hub, args.class.as_deref());
    let devices = hub.devices(&class).await?;
    tracing::debug!(class = %class, count = devices.len(), "listed devices");

    let out = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| d.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
