//! Service read, set, and toggle handlers.

use serde::Serialize;

use aquila_core::{CoreError, Device, Hub, HubSyncLoop, ServicePatch, ServiceState, SyncConfig};

use crate::cli::{GlobalOpts, SetArgs, TargetArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// One device service as printed by `state`, `set`, and `toggle`.
#[derive(Serialize)]
struct ServiceView {
    device: String,
    class: String,
    service: String,
    #[serde(rename = "isOn")]
    is_on: bool,
}

impl ServiceView {
    fn new(device: &Device, service: &str, state: &ServiceState) -> Self {
        Self {
            device: device.id.clone(),
            class: device.class.clone(),
            service: service.to_owned(),
            is_on: state.is_on,
        }
    }
}

fn print_view(view: &ServiceView, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        view,
        |v| {
            output::detail(&[
                ("Device", v.device.clone()),
                ("Class", v.class.clone()),
                ("Service", v.service.clone()),
                ("State", output::paint_switch(v.is_on, color)),
            ])
        },
        |v| output::paint_switch(v.is_on, false),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn state(hub: &Hub, target: TargetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let service = util::service_for(hub, target.service.as_deref());
    let device = util::resolve_device(hub, &target).await?;
    let state = hub.read_service(&device.id, &service).await?;
    print_view(&ServiceView::new(&device, &service, &state), global)
}

pub async fn set(hub: &Hub, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let service = util::service_for(hub, args.target.service.as_deref());
    let device = util::resolve_device(hub, &args.target).await?;
    let state = hub
        .write_service(&device.id, &service, &ServicePatch::is_on(args.state.is_on()))
        .await?;
    print_view(&ServiceView::new(&device, &service, &state), global)
}

/// Flip a service. With `--device` this is a plain read then write;
/// otherwise a sync loop binds the first device of the class and the
/// toggle goes through it.
pub async fn toggle(hub: &Hub, target: TargetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let service = util::service_for(hub, target.service.as_deref());

    if target.device.is_some() {
        let device = util::resolve_device(hub, &target).await?;
        let current = hub.read_service(&device.id, &service).await?;
        let state = hub
            .write_service(&device.id, &service, &ServicePatch::is_on(!current.is_on))
            .await?;
        return print_view(&ServiceView::new(&device, &service, &state), global);
    }

    let config = SyncConfig {
        device_class: util::class_for(hub, target.class.as_deref()),
        service: service.clone(),
        ..hub.config().sync.clone()
    };
    let sync = hub.sync_loop_with(config);
    let result = toggle_bound(&sync).await;
    sync.shutdown();

    let (device, state) = result?;
    print_view(&ServiceView::new(&device, &service, &state), global)
}

async fn toggle_bound(sync: &HubSyncLoop) -> Result<(Device, ServiceState), CoreError> {
    let device = sync.init().await?;
    // Seed the cache so the toggle flips the real state
    if let Err(e) = sync.refresh().await {
        tracing::warn!(error = %e, "initial read failed, toggling from assumed state");
    }
    let state = sync.toggle().await?;
    Ok((device, state))
}
