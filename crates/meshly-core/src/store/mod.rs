// ── Central reactive data store ──
//
// Thread-safe, ordered storage for the hub's mirrored entities.
// Mutations are broadcast to subscribers via `watch` channels.

mod collection;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{Device, DeviceDelta, Group, GroupDelta, MeshStatus, StatusDelta};
use crate::stream::EntityStream;
use collection::EntityCollection;

/// Central reactive store mirroring the hub's entity state.
///
/// Collections preserve arrival order so list views stay stable across
/// partial updates. All mutations merge field-wise: an update naming
/// only some fields leaves the rest untouched. Subscribers are
/// notified through `watch` channels.
pub struct DataStore {
    devices: EntityCollection<Device>,
    groups: EntityCollection<Group>,
    status: watch::Sender<MeshStatus>,
    last_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (status, _) = watch::channel(MeshStatus::default());
        let (last_event, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            groups: EntityCollection::new(),
            status,
            last_event,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert or merge a device record. Returns `true` if the id was new.
    pub fn upsert_device(&self, delta: DeviceDelta) -> bool {
        self.touch();
        self.devices.upsert_with(
            delta.avion_id,
            || delta.clone().into_device(),
            |existing| delta.clone().merge_into(existing),
        )
    }

    /// Remove a device. Idempotent; group memberships referencing the
    /// id are deliberately left alone (the hub owns membership lists).
    pub fn remove_device(&self, avion_id: u16) -> Option<Arc<Device>> {
        self.touch();
        self.devices.remove(avion_id)
    }

    /// Insert or merge a group record. Returns `true` if the id was new.
    pub fn upsert_group(&self, delta: GroupDelta) -> bool {
        self.touch();
        self.groups.upsert_with(
            delta.group_id,
            || delta.clone().into_group(),
            |existing| delta.clone().merge_into(existing),
        )
    }

    /// Remove a group. Idempotent.
    pub fn remove_group(&self, group_id: u16) -> Option<Arc<Group>> {
        self.touch();
        self.groups.remove(group_id)
    }

    /// Merge a partial status update into the mesh status.
    pub fn apply_status(&self, delta: StatusDelta) {
        self.touch();
        self.status.send_modify(|s| *s = delta.merge_into(s));
    }

    /// Drop every mirrored entity and reset status. Called when the
    /// push channel (re)connects: the hub replays full state to each
    /// new session, so anything held locally is stale.
    pub fn clear(&self) {
        self.devices.clear();
        self.groups.clear();
        self.status.send_modify(|s| *s = MeshStatus::default());
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn device(&self, avion_id: u16) -> Option<Arc<Device>> {
        self.devices.get(avion_id)
    }

    pub fn group(&self, group_id: u16) -> Option<Arc<Group>> {
        self.groups.get(group_id)
    }

    pub fn has_device(&self, avion_id: u16) -> bool {
        self.devices.contains(avion_id)
    }

    pub fn has_group(&self, group_id: u16) -> bool {
        self.groups.contains(group_id)
    }

    pub fn status(&self) -> MeshStatus {
        self.status.borrow().clone()
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn groups_snapshot(&self) -> Arc<Vec<Arc<Group>>> {
        self.groups.snapshot()
    }

    /// Groups as a view would render them: the synthetic broadcast
    /// pseudo-group first, then the hub's groups in arrival order.
    pub fn groups_with_broadcast(&self) -> Vec<Arc<Group>> {
        let status = self.status.borrow();
        let mut out = Vec::with_capacity(self.groups.len() + 1);
        out.push(Arc::new(Group::broadcast(status.mqtt_exposed)));
        out.extend(self.groups.snapshot().iter().map(Arc::clone));
        out
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    pub fn subscribe_groups(&self) -> EntityStream<Group> {
        EntityStream::new(self.groups.subscribe())
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MeshStatus> {
        self.status.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    fn touch(&self) {
        // `send_replace` so the timestamp updates with zero receivers.
        self.last_event.send_replace(Some(Utc::now()));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BROADCAST_GROUP_ID, ProductType, RadioState};

    fn full_device(id: u16, name: &str) -> DeviceDelta {
        DeviceDelta {
            avion_id: id,
            name: Some(name.to_owned()),
            product: Some(ProductType::SmartBulb),
            groups: Some([1].into()),
            mqtt_exposed: Some(true),
            brightness: Some(200),
            color_temp: Some(3000),
        }
    }

    #[test]
    fn partial_update_preserves_other_fields() {
        let store = DataStore::new();
        store.upsert_device(full_device(7, "Porch"));

        store.upsert_device(DeviceDelta::state(7, 0, None));

        let dev = store.device(7).unwrap();
        assert_eq!(dev.name, "Porch");
        assert_eq!(dev.brightness, Some(0));
        assert_eq!(dev.color_temp, Some(3000));
        assert!(dev.mqtt_exposed);
    }

    #[test]
    fn update_for_unknown_id_creates_entry() {
        let store = DataStore::new();
        assert!(store.upsert_device(DeviceDelta::state(9, 128, Some(2700))));
        let dev = store.device(9).unwrap();
        assert_eq!(dev.brightness, Some(128));
        assert_eq!(dev.name, "#9");
    }

    #[test]
    fn remove_then_reupsert_recreates() {
        let store = DataStore::new();
        store.upsert_device(full_device(3, "Hall"));
        assert!(store.remove_device(3).is_some());
        assert!(store.remove_device(3).is_none());

        assert!(store.upsert_device(full_device(3, "Hall")));
        assert_eq!(store.device_count(), 1);
    }

    #[test]
    fn device_removal_does_not_prune_group_members() {
        let store = DataStore::new();
        store.upsert_device(full_device(4, "Lamp"));
        store.upsert_group(GroupDelta {
            group_id: 1,
            name: Some("Living Room".into()),
            members: Some([4, 5].into()),
            mqtt_exposed: None,
        });

        store.remove_device(4);
        let group = store.group(1).unwrap();
        assert!(group.members.contains(&4));
    }

    #[test]
    fn clear_resets_everything() {
        let store = DataStore::new();
        store.upsert_device(full_device(1, "A"));
        store.upsert_group(GroupDelta { group_id: 2, ..GroupDelta::default() });
        store.apply_status(StatusDelta {
            radio: Some(RadioState::Ready),
            mesh_initialized: Some(true),
            ..StatusDelta::default()
        });

        store.clear();
        assert_eq!(store.device_count(), 0);
        assert_eq!(store.group_count(), 0);
        assert_eq!(store.status(), MeshStatus::default());
    }

    #[test]
    fn broadcast_group_is_synthesized_first() {
        let store = DataStore::new();
        store.apply_status(StatusDelta {
            mqtt_exposed: Some(true),
            ..StatusDelta::default()
        });
        store.upsert_group(GroupDelta {
            group_id: 9,
            name: Some("Bedroom".into()),
            ..GroupDelta::default()
        });

        let groups = store.groups_with_broadcast();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_id, BROADCAST_GROUP_ID);
        assert!(groups[0].mqtt_exposed);
        assert_eq!(groups[1].group_id, 9);
    }

    #[test]
    fn mutations_record_last_event_without_subscribers() {
        let store = DataStore::new();
        assert!(store.last_event().is_none());

        store.upsert_device(DeviceDelta::state(1, 50, None));
        assert!(store.last_event().is_some());
    }

    #[tokio::test]
    async fn status_subscribers_see_merges() {
        let store = DataStore::new();
        let mut rx = store.subscribe_status();

        store.apply_status(StatusDelta {
            radio: Some(RadioState::Ready),
            ..StatusDelta::default()
        });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().radio, RadioState::Ready);
    }
}
