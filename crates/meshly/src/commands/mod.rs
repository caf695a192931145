//! Command handlers.
//!
//! Each hub-facing handler gets an already-connected, already-synced
//! [`Controller`]; `dispatch` owns the connect / sync / disconnect
//! bracket so handlers stay focused on their one operation.

pub mod config_cmd;
mod devices;
mod groups;
mod provision;
mod system;
mod util;
mod watch;

use meshly_core::{Controller, HubConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(
    cmd: Command,
    hub_config: HubConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let controller = Controller::new(hub_config)?;
    controller.connect().await?;

    let result = match cmd {
        // Watch subscribes before the replay so the sync itself is
        // visible in the stream.
        Command::Watch => watch::run(&controller, global).await,

        cmd => match util::wait_for_sync(&controller, global).await {
            Ok(()) => route(cmd, &controller, global).await,
            Err(err) => Err(err),
        },
    };

    controller.disconnect().await;
    result
}

async fn route(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => system::status(controller, global),
        Command::Devices(args) => devices::handle(args.command, controller, global).await,
        Command::Groups(args) => groups::handle(args.command, controller, global).await,
        Command::Scan(args) => provision::scan(args.command, controller, global).await,
        Command::Claim(args) => provision::claim(args, controller, global).await,
        Command::Mqtt(args) => system::mqtt(args, controller, global).await,
        Command::System(args) => system::handle(args.command, controller, global).await,

        // Watch is routed before the sync wait in `dispatch`.
        Command::Watch => Ok(()),
        // Config is handled in main without a hub connection.
        Command::Config(args) => config_cmd::handle(&args, global),
    }
}
