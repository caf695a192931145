//! Discovery and claiming.
//!
//! Scans and claims are fire-and-result: the hub acknowledges the POST
//! immediately and the outcome lands on the event stream later, so
//! each handler subscribes first, executes, then waits for the
//! matching update. The correlation tracker in the core rejects a
//! second scan or claim while one is outstanding.

use tabled::Tabled;

use meshly_api::DiscoveredDevice;
use meshly_core::{Command, Controller, ProductType, Update, parse_uuid_hash};

use crate::cli::{ClaimArgs, GlobalOpts, ScanCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "FIRMWARE")]
    fw: String,
    #[tabled(rename = "VENDOR")]
    vendor: String,
    #[tabled(rename = "PRODUCT")]
    product: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl From<&DiscoveredDevice> for CandidateRow {
    fn from(dev: &DiscoveredDevice) -> Self {
        Self {
            id: dev.device_id,
            fw: dev.fw.clone(),
            vendor: format!("{:#06x}", dev.vendor_id),
            product: ProductType::from_code(dev.csr_product_id).name(),
            status: if dev.known { "known".into() } else { "new".into() },
        }
    }
}

pub async fn scan(
    cmd: ScanCommand,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        ScanCommand::Mesh => {
            let mut rx = controller.updates();
            controller.execute(Command::DiscoverMesh).await?;
            output::print_output("Scanning the mesh...", global.quiet);

            util::await_update(&mut rx, util::SCAN_WAIT, "mesh scan results", |update| {
                matches!(update, Update::ScanResults).then_some(())
            })
            .await?;

            let found = controller.tracker().mesh_candidates();
            if found.is_empty() {
                output::print_output("No devices responded", global.quiet);
                return Ok(());
            }
            let rendered =
                output::render_list(&global.output, &found, |d| CandidateRow::from(d), |d| {
                    d.device_id.to_string()
                });
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ScanCommand::New => {
            let mut rx = controller.updates();
            controller.execute(Command::ScanUnassociated).await?;
            output::print_output("Listening for unassociated devices...", global.quiet);

            util::await_update(&mut rx, util::SCAN_WAIT, "unassociated scan results", |update| {
                matches!(update, Update::Candidates).then_some(())
            })
            .await?;

            let hashes = controller.tracker().unassoc_candidates();
            if hashes.is_empty() {
                output::print_output("No unassociated devices heard", global.quiet);
                return Ok(());
            }
            let lines =
                hashes.iter().map(|h| format!("{h:#010x}")).collect::<Vec<_>>().join("\n");
            output::print_output(&lines, global.quiet);
            Ok(())
        }
    }
}

pub async fn claim(
    args: ClaimArgs,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let uuid_hash = parse_uuid_hash(&args.uuid_hash).ok_or_else(|| CliError::Validation {
        field: "uuid_hash".into(),
        reason: format!("{:?} is not a 0x-prefixed hex hash", args.uuid_hash),
    })?;

    let mut rx = controller.updates();
    controller
        .execute(Command::ClaimDevice {
            uuid_hash,
            name: args.name,
            product: args.product.map(ProductType::from_code),
        })
        .await?;
    output::print_output(&format!("Claiming {uuid_hash:#010x}..."), global.quiet);

    let outcome = util::await_update(&mut rx, util::CLAIM_WAIT, "claim result", |update| {
        match update {
            Update::ClaimSucceeded { device_id } => Some(Ok(*device_id)),
            Update::ClaimFailed { message } => Some(Err(message.clone())),
            _ => None,
        }
    })
    .await?;

    match outcome {
        Ok(Some(device_id)) => {
            output::print_output(&format!("Claimed as device {device_id}"), global.quiet);
            Ok(())
        }
        Ok(None) => {
            output::print_output("Claimed", global.quiet);
            Ok(())
        }
        Err(message) => Err(CliError::Rejected { message }),
    }
}
