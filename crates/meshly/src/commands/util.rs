//! Shared helpers for command handlers.

use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use meshly_api::BackupPayload;
use meshly_core::{Controller, CoreError, Update};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// Result waits are bounded per operation kind, not by the request
// timeout: the hub acknowledges immediately and the outcome arrives
// later on the event stream.
pub const SCAN_WAIT: Duration = Duration::from_secs(120);
pub const CLAIM_WAIT: Duration = Duration::from_secs(60);
pub const EXAMINE_WAIT: Duration = Duration::from_secs(30);
pub const SAVE_WAIT: Duration = Duration::from_secs(30);
pub const IMPORT_WAIT: Duration = Duration::from_secs(60);

/// Bound the initial state replay with `--sync-timeout`.
pub async fn wait_for_sync(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    tokio::time::timeout(Duration::from_secs(global.sync_timeout), controller.wait_for_sync())
        .await
        .map_err(|_| CliError::SyncTimeout { seconds: global.sync_timeout })?
        .map_err(CliError::from)
}

/// Wait on an update receiver until `matcher` yields a value.
///
/// The receiver must be subscribed before the triggering command is
/// executed, otherwise the result can slip past unseen.
pub async fn await_update<T>(
    rx: &mut broadcast::Receiver<Arc<Update>>,
    wait: Duration,
    what: &str,
    mut matcher: impl FnMut(&Update) -> Option<T>,
) -> Result<T, CliError> {
    let outcome = tokio::time::timeout(wait, async {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    if let Some(value) = matcher(&update) {
                        return Ok(value);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CliError::from(CoreError::NotConnected));
                }
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(CliError::ResultTimeout { seconds: wait.as_secs(), what: what.into() }),
    }
}

/// Ask before a destructive operation.
///
/// `--yes` skips the prompt. Without a terminal there is nobody to
/// ask, so the command fails and names the flag.
pub fn confirm(action: &str, global: &GlobalOpts) -> Result<(), CliError> {
    if global.yes {
        return Ok(());
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes { action: action.to_owned() });
    }

    eprint!("{action}. Continue? [y/N] ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    match line.trim() {
        "y" | "Y" | "yes" => Ok(()),
        _ => Err(CliError::Aborted),
    }
}

/// Read and parse a JSON backup file.
pub fn read_backup_file(path: &Path) -> Result<BackupPayload, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
