//! Live update stream.
//!
//! Subscribes before the hub replays state, so the initial sync is
//! visible too. Runs until Ctrl-C.

use chrono::Local;
use owo_colors::OwoColorize;
use tokio::sync::broadcast;

use meshly_core::{Controller, Update};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn run(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let mut rx = controller.updates();
    let color = output::should_color(&global.color);

    eprintln!("Watching hub updates (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),

            recv = rx.recv() => match recv {
                Ok(update) => {
                    if let Some(line) = describe(controller, &update) {
                        print_line(&line, color);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    print_line(&format!("(lagged; {n} updates dropped)"), color);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

fn print_line(line: &str, color: bool) {
    let ts = Local::now().format("%H:%M:%S");
    if color {
        println!("{} {line}", ts.dimmed());
    } else {
        println!("{ts} {line}");
    }
}

fn describe(controller: &Controller, update: &Update) -> Option<String> {
    let store = controller.store();
    match update {
        Update::None => None,

        Update::Resync => Some("connected; hub is replaying state".into()),
        Update::SyncComplete => Some(format!(
            "sync complete ({} devices, {} groups)",
            store.devices_snapshot().len(),
            store.groups_snapshot().len()
        )),

        Update::StatusChanged => {
            let s = store.status();
            Some(format!(
                "status: radio {}, mesh {}, rx {}",
                s.radio,
                if s.mesh_initialized { "initialized" } else { "uninitialized" },
                s.rx_count
            ))
        }

        Update::DevicesChanged => {
            Some(format!("devices updated ({} known)", store.devices_snapshot().len()))
        }
        Update::GroupsChanged => {
            Some(format!("groups updated ({} known)", store.groups_snapshot().len()))
        }

        Update::DeviceState { avion_id, .. } => {
            let state = store.device(*avion_id).map_or_else(
                || "?".to_owned(),
                |d| {
                    let bri = d.brightness.map_or_else(|| "-".into(), |b| b.to_string());
                    let temp = d.color_temp.map_or_else(String::new, |k| format!(", {k} K"));
                    format!("bri {bri}{temp}")
                },
            );
            Some(format!("device {avion_id}: {state}"))
        }

        Update::ScanResults => Some(format!(
            "mesh scan finished ({} responders)",
            controller.tracker().mesh_candidates().len()
        )),
        Update::Candidates => Some(format!(
            "unassociated scan finished ({} heard)",
            controller.tracker().unassoc_candidates().len()
        )),

        Update::ClaimSucceeded { device_id } => Some(match device_id {
            Some(id) => format!("claim succeeded: device {id}"),
            None => "claim succeeded".into(),
        }),
        Update::ClaimFailed { message } => Some(format!("claim failed: {message}")),

        Update::Examine(payload) => Some(format!(
            "examine result for device {}: fw {}",
            payload.avion_id,
            payload.fw.as_deref().unwrap_or("unknown")
        )),

        Update::Saved => Some("saved to hub flash".into()),
        Update::Imported { added_devices, added_groups } => {
            Some(format!("imported {added_devices} device(s), {added_groups} group(s)"))
        }

        Update::Debug(line) => Some(format!("DBG: {line}")),
    }
}
