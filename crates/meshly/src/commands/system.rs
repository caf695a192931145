//! Status, MQTT exposure, and mesh administration.

use std::fmt::Write as _;

use secrecy::SecretString;

use meshly_core::{Command, CommandResult, Controller, MeshStatus, Update};

use crate::cli::{GlobalOpts, MqttArgs, SystemCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

fn status_detail(status: &MeshStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Radio:       {}", status.radio);
    let _ = writeln!(
        out,
        "Mesh:        {}",
        if status.mesh_initialized { "initialized" } else { "not initialized" }
    );
    let _ = writeln!(out, "RX count:    {}", status.rx_count);
    let _ = write!(
        out,
        "MQTT bridge: {}",
        if status.mqtt_exposed { "exposed" } else { "hidden" }
    );
    out
}

pub fn status(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let status = controller.store().status();
    let rendered =
        output::render_single(&global.output, &status, status_detail, |s| s.radio.to_string());
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn mqtt(
    args: MqttArgs,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let exposed = args.state.as_bool();
    controller.execute(Command::SetMqttExposed { id: args.id, exposed }).await?;

    let target = if args.id == 0 { "mesh".to_owned() } else { format!("id {}", args.id) };
    let verb = if exposed { "exposed over" } else { "hidden from" };
    output::print_output(&format!("MQTT: {target} {verb} the bridge"), global.quiet);
    Ok(())
}

pub async fn handle(
    cmd: SystemCommand,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        SystemCommand::Passphrase { passphrase } => {
            controller.execute(Command::SetPassphrase(SecretString::from(passphrase))).await?;
            output::print_output(
                "Passphrase set; the hub is re-keying the mesh",
                global.quiet,
            );
            Ok(())
        }

        SystemCommand::GeneratePassphrase => {
            let result = controller.execute(Command::GeneratePassphrase).await?;
            match result {
                CommandResult::Passphrase(phrase) => {
                    // Printed exactly once; the client never stores it.
                    println!("{phrase}");
                    Ok(())
                }
                _ => Err(CliError::Rejected {
                    message: "hub did not return a passphrase".into(),
                }),
            }
        }

        SystemCommand::Save => {
            let mut rx = controller.updates();
            controller.execute(Command::Save).await?;
            util::await_update(&mut rx, util::SAVE_WAIT, "save confirmation", |update| {
                matches!(update, Update::Saved).then_some(())
            })
            .await?;
            output::print_output("Saved devices and groups to hub flash", global.quiet);
            Ok(())
        }

        SystemCommand::Import { file } => {
            let payload = util::read_backup_file(&file)?;
            let mut rx = controller.updates();
            controller.execute(Command::Import(payload)).await?;

            let (devices, groups) =
                util::await_update(&mut rx, util::IMPORT_WAIT, "import result", |update| {
                    match update {
                        Update::Imported { added_devices, added_groups } => {
                            Some((*added_devices, *added_groups))
                        }
                        _ => None,
                    }
                })
                .await?;

            output::print_output(
                &format!("Imported {devices} device(s) and {groups} group(s)"),
                global.quiet,
            );
            Ok(())
        }

        SystemCommand::FactoryReset => {
            util::confirm("This erases every device, group, and key on the hub", global)?;
            controller.execute(Command::FactoryReset).await?;
            output::print_output("Factory reset requested", global.quiet);
            Ok(())
        }
    }
}
