// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The
// controller routes each variant to the matching hub endpoint; the
// hub only acknowledges, and the real outcome arrives as push events.

use secrecy::SecretString;

use meshly_api::BackupPayload;

use crate::error::CoreError;
use crate::guard::ControlTarget;
use crate::model::ProductType;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All possible write operations against the hub.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Light control ────────────────────────────────────────────────
    SetBrightness {
        target: ControlTarget,
        value: u8,
    },
    /// Kelvin. A value of 0 is the wire's "unsupported" sentinel and
    /// is skipped rather than sent.
    SetColorTemp {
        target: ControlTarget,
        value: u16,
    },

    // ── Device management ────────────────────────────────────────────
    ExamineDevice {
        avion_id: u16,
    },
    UnclaimDevice {
        avion_id: u16,
    },
    /// id 0 targets the mesh itself.
    SetMqttExposed {
        id: u16,
        exposed: bool,
    },

    // ── Groups ───────────────────────────────────────────────────────
    CreateGroup {
        name: String,
    },
    DeleteGroup {
        group_id: u16,
    },
    AddToGroup {
        group_id: u16,
        avion_id: u16,
    },
    RemoveFromGroup {
        group_id: u16,
        avion_id: u16,
    },

    // ── Discovery / provisioning ─────────────────────────────────────
    DiscoverMesh,
    ScanUnassociated,
    AddDiscovered {
        device_id: u16,
        name: Option<String>,
        product: Option<ProductType>,
    },
    ClaimDevice {
        uuid_hash: u32,
        name: Option<String>,
        product: Option<ProductType>,
    },

    // ── Mesh administration ──────────────────────────────────────────
    Import(BackupPayload),
    Save,
    SetPassphrase(SecretString),
    GeneratePassphrase,
    FactoryReset,
}

/// Result of a command dispatch. The hub answers commands with an
/// acknowledgment only; anything more arrives on the event stream.
#[derive(Debug)]
pub enum CommandResult {
    /// Accepted by the hub.
    Ok,
    /// Deliberately not sent (e.g. color temp 0 on an unsupporting device).
    Skipped,
    /// A freshly generated passphrase. Never stored by this client.
    Passphrase(String),
}
