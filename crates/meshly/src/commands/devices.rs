//! Device subcommands.

use std::fmt::Write as _;

use tabled::Tabled;

use meshly_core::{
    Command, CommandResult, ControlTarget, Controller, Device, ProductType, Update,
};

use crate::cli::{DevicesCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PRODUCT")]
    product: String,
    #[tabled(rename = "BRI")]
    brightness: String,
    #[tabled(rename = "TEMP")]
    color_temp: String,
    #[tabled(rename = "GROUPS")]
    groups: String,
    #[tabled(rename = "MQTT")]
    mqtt: String,
}

impl From<&Device> for DeviceRow {
    fn from(dev: &Device) -> Self {
        Self {
            id: dev.avion_id,
            name: dev.name.clone(),
            product: dev.product.name(),
            brightness: dev.brightness.map_or_else(|| "-".into(), |b| b.to_string()),
            color_temp: dev.color_temp.map_or_else(|| "-".into(), |k| format!("{k} K")),
            groups: if dev.groups.is_empty() {
                "-".into()
            } else {
                dev.groups.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
            },
            mqtt: if dev.mqtt_exposed { "yes".into() } else { "-".into() },
        }
    }
}

fn detail(dev: &Device) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Device {}", dev.avion_id);
    let _ = writeln!(out, "  Name:       {}", dev.name);
    let _ = writeln!(out, "  Product:    {} ({})", dev.product.name(), dev.product.code());
    let _ = writeln!(
        out,
        "  Brightness: {}",
        dev.brightness.map_or_else(|| "unreported".into(), |b| b.to_string())
    );
    let _ = writeln!(
        out,
        "  Color temp: {}",
        dev.color_temp.map_or_else(|| "unsupported".into(), |k| format!("{k} K"))
    );
    let _ = writeln!(
        out,
        "  Groups:     {}",
        if dev.groups.is_empty() {
            "none".into()
        } else {
            dev.groups.iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
        }
    );
    let _ = write!(out, "  MQTT:       {}", if dev.mqtt_exposed { "exposed" } else { "hidden" });
    out
}

pub async fn handle(
    cmd: DevicesCommand,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        DevicesCommand::List => {
            let devices: Vec<Device> =
                controller.store().devices_snapshot().iter().map(|d| (**d).clone()).collect();
            // Closure rather than the fn item: `render_list` needs a
            // `for<'a> Fn(&'a Device)` bound the bare item cannot meet.
            let rendered = output::render_list(
                &global.output,
                &devices,
                |d| DeviceRow::from(d),
                |d| d.avion_id.to_string(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        DevicesCommand::Show { avion_id } => {
            let device = controller.store().device(avion_id).ok_or_else(|| CliError::NotFound {
                resource_type: "device".into(),
                id: avion_id.to_string(),
                list_command: "devices list".into(),
            })?;
            let rendered = output::render_single(
                &global.output,
                &*device,
                detail,
                |d| d.avion_id.to_string(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        DevicesCommand::On { avion_id } => {
            set_brightness(controller, global, avion_id, 255).await
        }
        DevicesCommand::Off { avion_id } => {
            set_brightness(controller, global, avion_id, 0).await
        }
        DevicesCommand::Brightness { avion_id, value } => {
            set_brightness(controller, global, avion_id, value).await
        }

        DevicesCommand::Temp { avion_id, kelvin } => {
            let result = controller
                .execute(Command::SetColorTemp { target: ControlTarget::Device(avion_id), value: kelvin })
                .await?;
            match result {
                CommandResult::Skipped => {
                    output::print_output("Skipped: a color temperature of 0 is never sent", global.quiet);
                }
                _ => output::print_output(
                    &format!("Device {avion_id} set to {kelvin} K"),
                    global.quiet,
                ),
            }
            Ok(())
        }

        DevicesCommand::Examine { avion_id } => examine(controller, global, avion_id).await,

        DevicesCommand::Remove { avion_id } => {
            util::confirm(&format!("This unclaims device {avion_id} from the mesh"), global)?;
            controller.execute(Command::UnclaimDevice { avion_id }).await?;
            output::print_output(&format!("Device {avion_id} unclaimed"), global.quiet);
            Ok(())
        }

        DevicesCommand::Add { device_id, name, product } => {
            controller
                .execute(Command::AddDiscovered {
                    device_id,
                    name,
                    product: product.map(ProductType::from_code),
                })
                .await?;
            output::print_output(&format!("Device {device_id} registered"), global.quiet);
            Ok(())
        }
    }
}

async fn set_brightness(
    controller: &Controller,
    global: &GlobalOpts,
    avion_id: u16,
    value: u8,
) -> Result<(), CliError> {
    controller
        .execute(Command::SetBrightness { target: ControlTarget::Device(avion_id), value })
        .await?;
    let state = match value {
        0 => "off".to_owned(),
        255 => "on".to_owned(),
        v => format!("brightness {v}"),
    };
    output::print_output(&format!("Device {avion_id} set to {state}"), global.quiet);
    Ok(())
}

async fn examine(
    controller: &Controller,
    global: &GlobalOpts,
    avion_id: u16,
) -> Result<(), CliError> {
    let mut rx = controller.updates();
    controller.execute(Command::ExamineDevice { avion_id }).await?;

    let payload = util::await_update(
        &mut rx,
        util::EXAMINE_WAIT,
        &format!("examine result for device {avion_id}"),
        |update| match update {
            Update::Examine(p) if p.avion_id == avion_id => Some(p.clone()),
            _ => None,
        },
    )
    .await?;

    if let Some(message) = payload.error {
        return Err(CliError::Rejected { message });
    }

    let mut out = String::new();
    let _ = writeln!(out, "Device {avion_id}");
    let _ = writeln!(out, "  Firmware: {}", payload.fw.as_deref().unwrap_or("unknown"));
    let _ = writeln!(
        out,
        "  Vendor:   {}",
        payload.vendor_id.map_or_else(|| "unknown".into(), |v| format!("{v:#06x}"))
    );
    let _ = writeln!(
        out,
        "  Product:  {}",
        payload
            .csr_product_id
            .map_or_else(|| "unknown".into(), |p| ProductType::from_code(p).name())
    );
    let _ = write!(
        out,
        "  Flags:    {}",
        payload.flags.map_or_else(|| "unknown".into(), |f| format!("{f:#04x}"))
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
