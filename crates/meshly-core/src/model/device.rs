// ── Device domain types ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use meshly_api::DeviceRecord;

/// Avion product type codes, as reported by the mesh.
///
/// The code table is fixed firmware-side; unknown codes are preserved
/// raw so newer hardware still renders (by number) instead of being
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProductType {
    LampDimmer,
    RecessedDownlight,
    LightAdapter,
    SmartDimmer,
    SmartBulb,
    SurfaceDownlight,
    MicroEdge,
    SmartSwitch,
    Other(u8),
}

impl ProductType {
    pub fn from_code(code: u8) -> Self {
        match code {
            90 => Self::LampDimmer,
            93 => Self::RecessedDownlight,
            94 => Self::LightAdapter,
            97 => Self::SmartDimmer,
            134 => Self::SmartBulb,
            137 => Self::SurfaceDownlight,
            162 => Self::MicroEdge,
            167 => Self::SmartSwitch,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::LampDimmer => 90,
            Self::RecessedDownlight => 93,
            Self::LightAdapter => 94,
            Self::SmartDimmer => 97,
            Self::SmartBulb => 134,
            Self::SurfaceDownlight => 137,
            Self::MicroEdge => 162,
            Self::SmartSwitch => 167,
            Self::Other(code) => code,
        }
    }

    /// Display name matching the dashboard's product table.
    pub fn name(self) -> String {
        match self {
            Self::LampDimmer => "Lamp Dimmer".to_owned(),
            Self::RecessedDownlight => "Recessed DL".to_owned(),
            Self::LightAdapter => "Light Adapter".to_owned(),
            Self::SmartDimmer => "Smart Dimmer".to_owned(),
            Self::SmartBulb => "Smart Bulb".to_owned(),
            Self::SurfaceDownlight => "Surface DL".to_owned(),
            Self::MicroEdge => "Micro Edge".to_owned(),
            Self::SmartSwitch => "Smart Switch".to_owned(),
            Self::Other(code) => format!("Type {code}"),
        }
    }
}

impl Default for ProductType {
    /// The dashboard's default selection for claim/add flows.
    fn default() -> Self {
        Self::SmartBulb
    }
}

/// The canonical device type held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Mesh-assigned id; stable while the device stays claimed.
    pub avion_id: u16,
    pub name: String,
    pub product: ProductType,
    /// Ids of the groups this device belongs to.
    pub groups: BTreeSet<u16>,
    /// Exposed over the hub's MQTT bridge.
    pub mqtt_exposed: bool,
    /// 0-255; `None` means the mesh has never reported it.
    pub brightness: Option<u8>,
    /// Kelvin; only present for devices that support color temperature.
    pub color_temp: Option<u16>,
}

impl Device {
    pub fn is_on(&self) -> bool {
        self.brightness.is_some_and(|b| b > 0)
    }
}

/// A partial device update. Only fields carried by the delta overwrite
/// the stored record; everything else is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDelta {
    pub avion_id: u16,
    pub name: Option<String>,
    pub product: Option<ProductType>,
    pub groups: Option<BTreeSet<u16>>,
    pub mqtt_exposed: Option<bool>,
    pub brightness: Option<u8>,
    pub color_temp: Option<u16>,
}

impl DeviceDelta {
    /// A delta touching only the live state fields.
    pub fn state(avion_id: u16, brightness: u8, color_temp: Option<u16>) -> Self {
        Self {
            avion_id,
            brightness: Some(brightness),
            color_temp,
            ..Self::default()
        }
    }

    /// Materialize a brand-new device from this delta alone.
    /// Unreported fields get neutral defaults.
    pub fn into_device(self) -> Device {
        Device {
            avion_id: self.avion_id,
            name: self.name.unwrap_or_else(|| format!("#{}", self.avion_id)),
            product: self.product.unwrap_or(ProductType::Other(0)),
            groups: self.groups.unwrap_or_default(),
            mqtt_exposed: self.mqtt_exposed.unwrap_or(false),
            brightness: self.brightness,
            color_temp: self.color_temp,
        }
    }

    /// Merge this delta over an existing device, field-wise.
    pub fn merge_into(self, existing: &Device) -> Device {
        Device {
            avion_id: existing.avion_id,
            name: self.name.unwrap_or_else(|| existing.name.clone()),
            product: self.product.unwrap_or(existing.product),
            groups: self.groups.unwrap_or_else(|| existing.groups.clone()),
            mqtt_exposed: self.mqtt_exposed.unwrap_or(existing.mqtt_exposed),
            brightness: self.brightness.or(existing.brightness),
            color_temp: self.color_temp.or(existing.color_temp),
        }
    }
}

impl From<DeviceRecord> for DeviceDelta {
    fn from(rec: DeviceRecord) -> Self {
        Self {
            avion_id: rec.avion_id,
            name: rec.name,
            product: rec.product_type.map(ProductType::from_code),
            groups: rec.groups.map(|g| g.into_iter().collect()),
            mqtt_exposed: rec.mqtt_exposed,
            brightness: rec.brightness,
            color_temp: rec.color_temp,
        }
    }
}
