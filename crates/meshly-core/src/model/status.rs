// ── Mesh/radio status types ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// BLE radio lifecycle as reported by the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum RadioState {
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Ready,
    #[default]
    Disconnected,
    /// A code this client does not know about.
    #[strum(to_string = "Unknown")]
    Unknown(u8),
}

impl RadioState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Scanning,
            2 => Self::Connecting,
            3 => Self::Discovering,
            4 => Self::Ready,
            5 => Self::Disconnected,
            other => Self::Unknown(other),
        }
    }

    /// Commands that touch the mesh require a ready radio.
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

/// Mesh-level status mirrored from `meta` and `mesh_status` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStatus {
    pub radio: RadioState,
    /// False until a passphrase has been configured on the hub.
    pub mesh_initialized: bool,
    /// Messages received from the mesh since hub boot.
    pub rx_count: u64,
    /// Whether the mesh as a whole is bridged to MQTT.
    pub mqtt_exposed: bool,
}

/// A partial status update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDelta {
    pub radio: Option<RadioState>,
    pub mesh_initialized: Option<bool>,
    pub rx_count: Option<u64>,
    pub mqtt_exposed: Option<bool>,
}

impl StatusDelta {
    pub fn merge_into(self, existing: &MeshStatus) -> MeshStatus {
        MeshStatus {
            radio: self.radio.unwrap_or(existing.radio),
            mesh_initialized: self.mesh_initialized.unwrap_or(existing.mesh_initialized),
            rx_count: self.rx_count.unwrap_or(existing.rx_count),
            mqtt_exposed: self.mqtt_exposed.unwrap_or(existing.mqtt_exposed),
        }
    }
}
