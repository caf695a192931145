// ── Group domain types ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use meshly_api::GroupRecord;

/// Reserved id for the synthetic "All (Broadcast)" pseudo-group.
///
/// Never persisted by the hub; commands addressed to it hit every
/// device on the mesh.
pub const BROADCAST_GROUP_ID: u16 = 0;

/// The canonical group type held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: u16,
    pub name: String,
    /// Member device ids. May reference ids the store cannot (yet)
    /// resolve to a device — cross-entity event ordering is not
    /// guaranteed, so views render unresolved ids raw.
    pub members: BTreeSet<u16>,
    pub mqtt_exposed: bool,
}

impl Group {
    /// Synthesize the broadcast pseudo-group from mesh-level state.
    pub fn broadcast(mesh_mqtt_exposed: bool) -> Self {
        Self {
            group_id: BROADCAST_GROUP_ID,
            name: "All (Broadcast)".to_owned(),
            members: BTreeSet::new(),
            mqtt_exposed: mesh_mqtt_exposed,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.group_id == BROADCAST_GROUP_ID
    }
}

/// A partial group update (same merge contract as `DeviceDelta`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDelta {
    pub group_id: u16,
    pub name: Option<String>,
    pub members: Option<BTreeSet<u16>>,
    pub mqtt_exposed: Option<bool>,
}

impl GroupDelta {
    pub fn into_group(self) -> Group {
        Group {
            group_id: self.group_id,
            name: self.name.unwrap_or_else(|| format!("#{}", self.group_id)),
            members: self.members.unwrap_or_default(),
            mqtt_exposed: self.mqtt_exposed.unwrap_or(false),
        }
    }

    pub fn merge_into(self, existing: &Group) -> Group {
        Group {
            group_id: existing.group_id,
            name: self.name.unwrap_or_else(|| existing.name.clone()),
            members: self.members.unwrap_or_else(|| existing.members.clone()),
            mqtt_exposed: self.mqtt_exposed.unwrap_or(existing.mqtt_exposed),
        }
    }
}

impl From<GroupRecord> for GroupDelta {
    fn from(rec: GroupRecord) -> Self {
        Self {
            group_id: rec.group_id,
            name: rec.name,
            members: rec.members.map(|m| m.into_iter().collect()),
            mqtt_exposed: rec.mqtt_exposed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_group_uses_reserved_id() {
        let g = Group::broadcast(true);
        assert_eq!(g.group_id, BROADCAST_GROUP_ID);
        assert!(g.is_broadcast());
        assert!(g.mqtt_exposed);
        assert!(g.members.is_empty());
    }

    #[test]
    fn merge_keeps_members_when_delta_omits_them() {
        let base = GroupDelta {
            group_id: 5,
            name: Some("Kitchen".into()),
            members: Some([1, 2].into()),
            mqtt_exposed: Some(false),
        }
        .into_group();

        let renamed = GroupDelta {
            group_id: 5,
            name: Some("Kitchen Lights".into()),
            ..GroupDelta::default()
        }
        .merge_into(&base);

        assert_eq!(renamed.name, "Kitchen Lights");
        assert_eq!(renamed.members, [1, 2].into());
    }
}
