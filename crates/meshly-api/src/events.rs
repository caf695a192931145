//! Typed push events from the hub's SSE channel.
//!
//! Every SSE frame carries an event name and a JSON payload. This module
//! turns the `(name, data)` pair into a [`MeshEvent`] — a discriminated
//! union the reconciler can consume without knowing anything about the
//! transport. Unknown event kinds and malformed payloads are skipped
//! (the stream is trusted but allowed to evolve).

use serde::{Deserialize, Serialize};

// ── Wire records ─────────────────────────────────────────────────────

/// A device as the hub serializes it. Every field except the id is
/// optional: bulk sync frames carry the full record, while partial
/// deltas (and older firmware) may omit fields. Absent fields must not
/// overwrite existing store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub avion_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_exposed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
}

/// A group as the hub serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_exposed: Option<bool>,
}

/// Radio/session metadata pushed on connect and on every state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPayload {
    pub ble_state: u8,
    #[serde(default)]
    pub mesh_initialized: bool,
    #[serde(default)]
    pub rx_count: u64,
}

/// Partial device state delta (brightness, optionally color temp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePayload {
    pub avion_id: u16,
    pub brightness: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
}

/// One row from a mesh ping scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub device_id: u16,
    pub fw: String,
    pub vendor_id: u16,
    pub csr_product_id: u8,
    pub known: bool,
}

/// Result of a claim attempt. The hub reports `status: "ok"` with the
/// assigned device id, or `status: "error"` with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResultPayload {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClaimResultPayload {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Examine response: firmware and identity details for one device, or
/// an error string (e.g. `"timeout"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminePayload {
    pub avion_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr_product_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts reported after a backup import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportResultPayload {
    #[serde(default)]
    pub added_devices: u32,
    #[serde(default)]
    pub added_groups: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DevicesEnvelope {
    #[serde(default)]
    devices: Vec<DeviceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupsEnvelope {
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiscoverEnvelope {
    #[serde(default)]
    devices: Vec<DiscoveredDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnassocEnvelope {
    #[serde(default)]
    uuid_hashes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct IdOnly {
    avion_id: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct GroupIdOnly {
    group_id: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct MeshStatusPayload {
    #[serde(default)]
    mesh_mqtt_exposed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct MqttToggledPayload {
    id: u16,
    mqtt_exposed: bool,
}

// ── MeshEvent ────────────────────────────────────────────────────────

/// A parsed event from the hub's push channel.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    /// Radio state + receive counter update.
    Meta(MetaPayload),
    /// Bulk device resync batch.
    Devices(Vec<DeviceRecord>),
    /// Bulk group resync batch.
    Groups(Vec<GroupRecord>),
    /// End of a full resync burst.
    SyncComplete,
    DeviceAdded(DeviceRecord),
    DeviceRemoved { avion_id: u16 },
    GroupAdded(GroupRecord),
    GroupRemoved { group_id: u16 },
    GroupUpdated(GroupRecord),
    /// Partial device state delta.
    State(StatePayload),
    /// Mesh-level MQTT exposure flag.
    MeshStatus { mesh_mqtt_exposed: bool },
    /// MQTT exposure toggled for an entity; id 0 means mesh level.
    MqttToggled { id: u16, mqtt_exposed: bool },
    /// Mesh ping scan finished.
    DiscoverMesh(Vec<DiscoveredDevice>),
    /// Unassociated-device scan finished; hashes are `0x`-prefixed hex.
    ScanUnassoc(Vec<String>),
    ClaimResult(ClaimResultPayload),
    Examine(ExaminePayload),
    /// Persistence acknowledgment, no payload.
    SaveResult,
    ImportResult(ImportResultPayload),
    /// Free-form diagnostics line from the hub.
    Debug(String),
}

impl MeshEvent {
    /// Parse an SSE `(event, data)` pair into a typed event.
    ///
    /// Returns `Ok(None)` for event kinds this client does not know,
    /// and `Err` when a known kind carries an undecodable payload —
    /// callers log and skip either way.
    pub fn parse(kind: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match kind {
            "meta" => Self::Meta(serde_json::from_str(data)?),
            "devices" => {
                let env: DevicesEnvelope = serde_json::from_str(data)?;
                Self::Devices(env.devices)
            }
            "groups" => {
                let env: GroupsEnvelope = serde_json::from_str(data)?;
                Self::Groups(env.groups)
            }
            "sync_complete" => Self::SyncComplete,
            "device_added" => Self::DeviceAdded(serde_json::from_str(data)?),
            "device_removed" => {
                let id: IdOnly = serde_json::from_str(data)?;
                Self::DeviceRemoved { avion_id: id.avion_id }
            }
            "group_added" => Self::GroupAdded(serde_json::from_str(data)?),
            "group_removed" => {
                let id: GroupIdOnly = serde_json::from_str(data)?;
                Self::GroupRemoved { group_id: id.group_id }
            }
            "group_updated" => Self::GroupUpdated(serde_json::from_str(data)?),
            "state" => Self::State(serde_json::from_str(data)?),
            "mesh_status" => {
                let p: MeshStatusPayload = serde_json::from_str(data)?;
                Self::MeshStatus { mesh_mqtt_exposed: p.mesh_mqtt_exposed }
            }
            "mqtt_toggled" => {
                let p: MqttToggledPayload = serde_json::from_str(data)?;
                Self::MqttToggled { id: p.id, mqtt_exposed: p.mqtt_exposed }
            }
            "discover_mesh" => {
                let env: DiscoverEnvelope = serde_json::from_str(data)?;
                Self::DiscoverMesh(env.devices)
            }
            "scan_unassoc" => {
                let env: UnassocEnvelope = serde_json::from_str(data)?;
                Self::ScanUnassoc(env.uuid_hashes)
            }
            "claim_result" => Self::ClaimResult(serde_json::from_str(data)?),
            "examine" => Self::Examine(serde_json::from_str(data)?),
            "save_result" => Self::SaveResult,
            "import_result" => Self::ImportResult(serde_json::from_str(data)?),
            "debug" => Self::Debug(data.to_owned()),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// The wire name of this event kind, for logging and the feed.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Meta(_) => "meta",
            Self::Devices(_) => "devices",
            Self::Groups(_) => "groups",
            Self::SyncComplete => "sync_complete",
            Self::DeviceAdded(_) => "device_added",
            Self::DeviceRemoved { .. } => "device_removed",
            Self::GroupAdded(_) => "group_added",
            Self::GroupRemoved { .. } => "group_removed",
            Self::GroupUpdated(_) => "group_updated",
            Self::State(_) => "state",
            Self::MeshStatus { .. } => "mesh_status",
            Self::MqttToggled { .. } => "mqtt_toggled",
            Self::DiscoverMesh(_) => "discover_mesh",
            Self::ScanUnassoc(_) => "scan_unassoc",
            Self::ClaimResult(_) => "claim_result",
            Self::Examine(_) => "examine",
            Self::SaveResult => "save_result",
            Self::ImportResult(_) => "import_result",
            Self::Debug(_) => "debug",
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
