//! Group subcommands.
//!
//! Group control rides the same wire operation as device control; the
//! core resolves the target, including the broadcast pseudo-group 0.

use tabled::Tabled;

use meshly_core::{Command, CommandResult, ControlTarget, Controller, Group};

use crate::cli::{GlobalOpts, GroupsCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MEMBERS")]
    members: String,
    #[tabled(rename = "MQTT")]
    mqtt: String,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self {
            id: group.group_id,
            name: group.name.clone(),
            members: if group.is_broadcast() {
                "all".into()
            } else if group.members.is_empty() {
                "-".into()
            } else {
                group.members.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
            },
            mqtt: if group.mqtt_exposed { "yes".into() } else { "-".into() },
        }
    }
}

pub async fn handle(
    cmd: GroupsCommand,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        GroupsCommand::List => {
            let groups: Vec<Group> =
                controller.store().groups_with_broadcast().iter().map(|g| (**g).clone()).collect();
            let rendered = output::render_list(
                &global.output,
                &groups,
                |g| GroupRow::from(g),
                |g| g.group_id.to_string(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        GroupsCommand::Create { name } => {
            controller.execute(Command::CreateGroup { name: name.clone() }).await?;
            output::print_output(&format!("Group \"{name}\" created"), global.quiet);
            Ok(())
        }

        GroupsCommand::Delete { group_id } => {
            util::confirm(&format!("This deletes group {group_id}"), global)?;
            controller.execute(Command::DeleteGroup { group_id }).await?;
            output::print_output(&format!("Group {group_id} deleted"), global.quiet);
            Ok(())
        }

        GroupsCommand::Add { group_id, avion_id } => {
            controller.execute(Command::AddToGroup { group_id, avion_id }).await?;
            output::print_output(
                &format!("Device {avion_id} added to group {group_id}"),
                global.quiet,
            );
            Ok(())
        }

        GroupsCommand::Remove { group_id, avion_id } => {
            controller.execute(Command::RemoveFromGroup { group_id, avion_id }).await?;
            output::print_output(
                &format!("Device {avion_id} removed from group {group_id}"),
                global.quiet,
            );
            Ok(())
        }

        GroupsCommand::On { group_id } => set_brightness(controller, global, group_id, 255).await,
        GroupsCommand::Off { group_id } => set_brightness(controller, global, group_id, 0).await,
        GroupsCommand::Brightness { group_id, value } => {
            set_brightness(controller, global, group_id, value).await
        }

        GroupsCommand::Temp { group_id, kelvin } => {
            let result = controller
                .execute(Command::SetColorTemp {
                    target: ControlTarget::Group(group_id),
                    value: kelvin,
                })
                .await?;
            match result {
                CommandResult::Skipped => {
                    output::print_output(
                        "Skipped: a color temperature of 0 is never sent",
                        global.quiet,
                    );
                }
                _ => output::print_output(
                    &format!("Group {group_id} set to {kelvin} K"),
                    global.quiet,
                ),
            }
            Ok(())
        }
    }
}

async fn set_brightness(
    controller: &Controller,
    global: &GlobalOpts,
    group_id: u16,
    value: u8,
) -> Result<(), CliError> {
    controller
        .execute(Command::SetBrightness { target: ControlTarget::Group(group_id), value })
        .await?;
    let state = match value {
        0 => "off".to_owned(),
        255 => "on".to_owned(),
        v => format!("brightness {v}"),
    };
    output::print_output(&format!("Group {group_id} set to {state}"), global.quiet);
    Ok(())
}
