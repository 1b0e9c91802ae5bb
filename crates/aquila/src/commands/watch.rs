//! `watch`: bind a device and stream its service state.

use std::time::Duration;

use chrono::Local;

use aquila_core::{Hub, MergePolicy, PushChannel, Route, SyncConfig, SyncPhase, SyncSnapshot};

use crate::cli::{GlobalOpts, MergeArg, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn merge_policy(arg: MergeArg) -> MergePolicy {
    match arg {
        MergeArg::CompletionOrder => MergePolicy::CompletionOrder,
        MergeArg::IssuanceOrder => MergePolicy::IssuanceOrder,
    }
}

/// Layer the watch flags over the profile's sync settings.
fn sync_config(hub: &Hub, args: &WatchArgs) -> Result<SyncConfig, CliError> {
    let base = hub.config().sync.clone();
    let config = SyncConfig {
        device_class: util::class_for(hub, args.class.as_deref()),
        service: util::service_for(hub, args.service.as_deref()),
        poll_interval: args
            .interval_ms
            .map_or(base.poll_interval, Duration::from_millis),
        merge_policy: args.merge.map_or(base.merge_policy, merge_policy),
        push_refresh: args.push || base.push_refresh,
    };
    if config.poll_interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval-ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(config)
}

/// One printed line per observed change.
fn render_update(snap: &SyncSnapshot, global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(&global.color);
    match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(snap)?),
        OutputFormat::Plain => Ok(match (&snap.last_error, snap.is_on()) {
            (Some(err), _) => format!("error: {err}"),
            (None, Some(on)) => output::paint_switch(on, false),
            (None, None) => String::new(),
        }),
        OutputFormat::Table => {
            let at = snap
                .updated_at
                .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".into());
            let device = snap.device.as_ref().map_or("-", |d| d.id.as_str());
            let state = snap
                .is_on()
                .map_or_else(|| "?".into(), |on| output::paint_switch(on, color));
            Ok(match snap.last_error {
                Some(ref err) => format!(
                    "{at}  {device}  {state}  {}",
                    output::paint_error(err, color)
                ),
                None => format!("{at}  {device}  {state}"),
            })
        }
    }
}

pub async fn handle(hub: &Hub, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = sync_config(hub, &args)?;

    let push = if config.push_refresh {
        let handle = hub.open_push(PushChannel::Device);
        if handle.is_none() {
            tracing::warn!("push refresh requested but no device channel is configured");
        }
        handle
    } else {
        None
    };

    let mut sync = hub.sync_loop_with(config);
    if let Some(ref handle) = push {
        sync = sync.with_push(handle.subscribe());
    }
    let mut snapshots = sync.subscribe();
    let mut nav = hub.navigator().subscribe();

    let device = sync.init().await?;
    tracing::info!(device = %device.id, "watching");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    let mut last: Option<(Option<bool>, Option<String>)> = None;

    let result = loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => break Ok(()),

            changed = nav.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if nav.borrow_and_update().route == Route::Login {
                    break Err(CliError::SessionExpired);
                }
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snap = snapshots.borrow_and_update().clone();
                if matches!(snap.phase, SyncPhase::Stopped | SyncPhase::Unbound) {
                    break Ok(());
                }

                let key = (snap.is_on(), snap.last_error.clone());
                let unchanged = last.as_ref() == Some(&key);
                let empty = key.0.is_none() && key.1.is_none();
                last = Some(key);
                if unchanged || empty {
                    continue;
                }

                output::print_output(&render_update(&snap, global)?, global.quiet);
                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break Ok(());
                }
            }
        }
    };

    sync.shutdown();
    if let Some(handle) = push {
        handle.shutdown();
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use aquila_core::{Device, ServiceState};

    fn global(output: OutputFormat) -> GlobalOpts {
        GlobalOpts {
            profile: None,
            hub: None,
            session_file: None,
            output,
            color: crate::cli::ColorMode::Never,
            verbose: 0,
            quiet: false,
            insecure: false,
            timeout: None,
        }
    }

    fn bound(is_on: Option<bool>, error: Option<&str>) -> SyncSnapshot {
        SyncSnapshot {
            phase: SyncPhase::Bound,
            device: Some(Device {
                id: "d1".into(),
                class: "mx.makerlab.ledservice".into(),
                extra: serde_json::Map::new(),
            }),
            last_state: is_on.map(ServiceState::new),
            last_error: error.map(str::to_owned),
            ..SyncSnapshot::default()
        }
    }

    #[test]
    fn plain_update_is_bare_state() {
        let out = render_update(&bound(Some(true), None), &global(OutputFormat::Plain)).unwrap();
        assert_eq!(out, "on");
    }

    #[test]
    fn plain_update_reports_error() {
        let snap = bound(Some(false), Some("communication error: boom"));
        let out = render_update(&snap, &global(OutputFormat::Plain)).unwrap();
        assert_eq!(out, "error: communication error: boom");
    }

    #[test]
    fn table_update_shows_device_and_unknown_state() {
        let out = render_update(&bound(None, None), &global(OutputFormat::Table)).unwrap();
        assert!(out.contains("d1"));
        assert!(out.ends_with('?'));
    }

    #[test]
    fn json_update_is_single_line() {
        let out = render_update(&bound(Some(true), None), &global(OutputFormat::Json)).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains("\"phase\":\"bound\""));
    }
}
