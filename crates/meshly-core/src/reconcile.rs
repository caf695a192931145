// ── Event reconciliation ──
//
// One dispatch point turns every push event into store mutations plus
// a render effect. Views never see raw events; they react to `Update`s
// and read the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use meshly_api::{ExaminePayload, MeshEvent};

use crate::correlate::{CorrelationTracker, parse_uuid_hash};
use crate::guard::{ControlId, ControlKind, InteractionGuard};
use crate::model::{DeviceDelta, GroupDelta, RadioState, StatusDelta};
use crate::store::DataStore;

/// How long an examine result stays on screen before views may drop it.
pub const EXAMINE_DWELL: Duration = Duration::from_secs(15);
/// How long transient notices (claim outcome, import counts) linger.
pub const MESSAGE_DWELL: Duration = Duration::from_secs(5);
/// How long the save confirmation lingers.
pub const SAVE_DWELL: Duration = Duration::from_secs(3);

/// Render effect of one reconciled event.
///
/// The store is already mutated by the time a consumer sees one of
/// these; the variant says what is worth redrawing or announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Nothing to redraw (stray or redundant event).
    None,
    /// The push channel (re)connected. The local mirror was cleared
    /// and a full replay is about to land; views should show a
    /// "syncing" state until [`Update::SyncComplete`].
    Resync,
    /// Mesh status changed. Views showing the broadcast pseudo-group
    /// should refresh too -- its MQTT flag mirrors mesh status.
    StatusChanged,
    /// Device list membership or bulk contents changed.
    DevicesChanged,
    /// Group list membership or contents changed.
    GroupsChanged,
    /// The hub finished replaying full state to this session.
    SyncComplete,
    /// Live state landed for one device. A `false` flag means the user
    /// is holding that control and the visual write must be skipped
    /// (the store holds the new value regardless).
    DeviceState { avion_id: u16, write_brightness: bool, write_color_temp: bool },
    /// Mesh discovery finished; candidates are on the tracker.
    ScanResults,
    /// Unassociated-device scan finished; hashes are on the tracker.
    Candidates,
    ClaimSucceeded { device_id: Option<u16> },
    ClaimFailed { message: String },
    /// Examine details (or its timeout) for one device.
    Examine(ExaminePayload),
    /// Hub confirmed persisting to flash.
    Saved,
    Imported { added_devices: u32, added_groups: u32 },
    /// Free-form diagnostics line for the feed.
    Debug(String),
}

impl Update {
    /// Recommended on-screen dwell for transient results. `None` means
    /// the update describes durable state and never expires.
    pub fn dwell(&self) -> Option<Duration> {
        match self {
            Self::Examine(_) => Some(EXAMINE_DWELL),
            Self::Saved => Some(SAVE_DWELL),
            Self::ClaimSucceeded { .. } | Self::ClaimFailed { .. } | Self::Imported { .. } => {
                Some(MESSAGE_DWELL)
            }
            _ => None,
        }
    }
}

/// Applies push events to the store, consulting the interaction guard
/// and resolving tracker correlation as it goes.
pub struct Reconciler {
    store: Arc<DataStore>,
    guard: Arc<InteractionGuard>,
    tracker: Arc<CorrelationTracker>,
}

impl Reconciler {
    pub fn new(
        store: Arc<DataStore>,
        guard: Arc<InteractionGuard>,
        tracker: Arc<CorrelationTracker>,
    ) -> Self {
        Self { store, guard, tracker }
    }

    /// Apply one event. Infallible: a push stream has nobody to hand an
    /// error back to, so unroutable events degrade to [`Update::None`]
    /// with a log line.
    pub fn apply(&self, event: MeshEvent) -> Update {
        match event {
            MeshEvent::Meta(meta) => {
                self.store.apply_status(StatusDelta {
                    radio: Some(RadioState::from_code(meta.ble_state)),
                    mesh_initialized: Some(meta.mesh_initialized),
                    rx_count: Some(meta.rx_count),
                    ..StatusDelta::default()
                });
                Update::StatusChanged
            }

            MeshEvent::MeshStatus { mesh_mqtt_exposed } => {
                self.store.apply_status(StatusDelta {
                    mqtt_exposed: Some(mesh_mqtt_exposed),
                    ..StatusDelta::default()
                });
                Update::StatusChanged
            }

            MeshEvent::Devices(records) => {
                for rec in records {
                    self.store.upsert_device(DeviceDelta::from(rec));
                }
                Update::DevicesChanged
            }

            MeshEvent::Groups(records) => {
                for rec in records {
                    self.store.upsert_group(GroupDelta::from(rec));
                }
                Update::GroupsChanged
            }

            MeshEvent::SyncComplete => Update::SyncComplete,

            MeshEvent::DeviceAdded(rec) => {
                self.store.upsert_device(DeviceDelta::from(rec));
                Update::DevicesChanged
            }

            MeshEvent::DeviceRemoved { avion_id } => {
                // Group member lists are left alone; the hub owns them.
                match self.store.remove_device(avion_id) {
                    Some(_) => Update::DevicesChanged,
                    None => {
                        debug!(avion_id, "removal for unknown device ignored");
                        Update::None
                    }
                }
            }

            MeshEvent::GroupAdded(rec) | MeshEvent::GroupUpdated(rec) => {
                self.store.upsert_group(GroupDelta::from(rec));
                Update::GroupsChanged
            }

            MeshEvent::GroupRemoved { group_id } => match self.store.remove_group(group_id) {
                Some(_) => Update::GroupsChanged,
                None => {
                    debug!(group_id, "removal for unknown group ignored");
                    Update::None
                }
            },

            MeshEvent::State(state) => {
                // The store always takes the echo; only the visual
                // write is suppressed while the user holds the control.
                let write_brightness =
                    !self.guard.is_held(ControlId::device(state.avion_id, ControlKind::Brightness));
                let write_color_temp = state.color_temp.is_some()
                    && !self.guard.is_held(ControlId::device(state.avion_id, ControlKind::ColorTemp));

                self.store.upsert_device(DeviceDelta::state(
                    state.avion_id,
                    state.brightness,
                    state.color_temp,
                ));
                Update::DeviceState { avion_id: state.avion_id, write_brightness, write_color_temp }
            }

            MeshEvent::MqttToggled { id, mqtt_exposed } => self.route_mqtt_toggle(id, mqtt_exposed),

            MeshEvent::DiscoverMesh(devices) => {
                self.tracker.complete_mesh_scan(devices);
                Update::ScanResults
            }

            MeshEvent::ScanUnassoc(raw) => {
                let mut hashes = Vec::with_capacity(raw.len());
                for text in &raw {
                    match parse_uuid_hash(text) {
                        Some(hash) => hashes.push(hash),
                        None => warn!(hash = %text, "skipping malformed uuid hash"),
                    }
                }
                self.tracker.complete_unassoc_scan(hashes);
                Update::Candidates
            }

            MeshEvent::ClaimResult(result) => {
                let ok = result.is_ok();
                if self.tracker.resolve_claim(ok).is_none() {
                    debug!("claim result with no claim outstanding");
                }
                if ok {
                    Update::ClaimSucceeded { device_id: result.device_id }
                } else {
                    Update::ClaimFailed {
                        message: result.message.unwrap_or_else(|| "unknown error".to_owned()),
                    }
                }
            }

            MeshEvent::Examine(payload) => Update::Examine(payload),

            MeshEvent::SaveResult => Update::Saved,

            MeshEvent::ImportResult(counts) => Update::Imported {
                added_devices: counts.added_devices,
                added_groups: counts.added_groups,
            },

            MeshEvent::Debug(line) => Update::Debug(line),
        }
    }

    /// `mqtt_toggled` routing: id 0 is the mesh itself, otherwise try
    /// devices before groups (their id spaces overlap).
    fn route_mqtt_toggle(&self, id: u16, mqtt_exposed: bool) -> Update {
        if id == 0 {
            self.store.apply_status(StatusDelta {
                mqtt_exposed: Some(mqtt_exposed),
                ..StatusDelta::default()
            });
            return Update::StatusChanged;
        }
        if self.store.has_device(id) {
            self.store.upsert_device(DeviceDelta {
                avion_id: id,
                mqtt_exposed: Some(mqtt_exposed),
                ..DeviceDelta::default()
            });
            return Update::DevicesChanged;
        }
        if self.store.has_group(id) {
            self.store.upsert_group(GroupDelta {
                group_id: id,
                mqtt_exposed: Some(mqtt_exposed),
                ..GroupDelta::default()
            });
            return Update::GroupsChanged;
        }
        warn!(id, "mqtt toggle for unknown entity ignored");
        Update::None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use meshly_api::{ClaimResultPayload, DeviceRecord, MetaPayload, StatePayload};

    use super::*;
    use crate::model::ProductType;

    fn harness() -> (Reconciler, Arc<DataStore>, Arc<InteractionGuard>, Arc<CorrelationTracker>) {
        let store = Arc::new(DataStore::new());
        let guard = Arc::new(InteractionGuard::new());
        let tracker = Arc::new(CorrelationTracker::new());
        let rec = Reconciler::new(Arc::clone(&store), Arc::clone(&guard), Arc::clone(&tracker));
        (rec, store, guard, tracker)
    }

    fn seeded_device(id: u16) -> DeviceRecord {
        DeviceRecord {
            avion_id: id,
            name: Some(format!("Device {id}")),
            product_type: Some(134),
            product_name: None,
            groups: Some(vec![]),
            mqtt_exposed: Some(false),
            brightness: Some(100),
            color_temp: Some(2700),
        }
    }

    #[test]
    fn meta_updates_status() {
        let (rec, store, _, _) = harness();
        let update = rec.apply(MeshEvent::Meta(MetaPayload {
            ble_state: 4,
            mesh_initialized: true,
            rx_count: 42,
        }));
        assert_eq!(update, Update::StatusChanged);
        let status = store.status();
        assert_eq!(status.radio, RadioState::Ready);
        assert!(status.mesh_initialized);
        assert_eq!(status.rx_count, 42);
    }

    #[test]
    fn state_echo_writes_store_even_while_held() {
        let (rec, store, guard, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(7)));
        guard.begin_edit(ControlId::device(7, ControlKind::Brightness));

        let update = rec.apply(MeshEvent::State(StatePayload {
            avion_id: 7,
            brightness: 10,
            color_temp: Some(3500),
        }));

        // Store took the echo; only the brightness visual is suppressed.
        assert_eq!(store.device(7).unwrap().brightness, Some(10));
        assert_eq!(store.device(7).unwrap().color_temp, Some(3500));
        assert_eq!(
            update,
            Update::DeviceState { avion_id: 7, write_brightness: false, write_color_temp: true }
        );
    }

    #[test]
    fn state_without_color_temp_never_writes_that_control() {
        let (rec, _, _, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(3)));

        let update = rec.apply(MeshEvent::State(StatePayload {
            avion_id: 3,
            brightness: 200,
            color_temp: None,
        }));
        assert_eq!(
            update,
            Update::DeviceState { avion_id: 3, write_brightness: true, write_color_temp: false }
        );
    }

    #[test]
    fn release_restores_write_through() {
        let (rec, _, guard, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(5)));
        let ctl = ControlId::device(5, ControlKind::Brightness);
        guard.begin_edit(ctl);
        guard.end_edit(ctl);

        let update = rec.apply(MeshEvent::State(StatePayload {
            avion_id: 5,
            brightness: 1,
            color_temp: None,
        }));
        assert!(matches!(update, Update::DeviceState { write_brightness: true, .. }));
    }

    #[test]
    fn mqtt_toggle_id_zero_targets_mesh() {
        let (rec, store, _, _) = harness();
        let update = rec.apply(MeshEvent::MqttToggled { id: 0, mqtt_exposed: true });
        assert_eq!(update, Update::StatusChanged);
        assert!(store.status().mqtt_exposed);
    }

    #[test]
    fn mqtt_toggle_prefers_device_over_group() {
        let (rec, store, _, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(4)));
        rec.apply(MeshEvent::GroupAdded(meshly_api::GroupRecord {
            group_id: 4,
            name: Some("Overlap".into()),
            members: None,
            mqtt_exposed: Some(false),
        }));

        let update = rec.apply(MeshEvent::MqttToggled { id: 4, mqtt_exposed: true });
        assert_eq!(update, Update::DevicesChanged);
        assert!(store.device(4).unwrap().mqtt_exposed);
        assert!(!store.group(4).unwrap().mqtt_exposed);
    }

    #[test]
    fn mqtt_toggle_falls_back_to_group() {
        let (rec, store, _, _) = harness();
        rec.apply(MeshEvent::GroupAdded(meshly_api::GroupRecord {
            group_id: 9,
            name: Some("Patio".into()),
            members: None,
            mqtt_exposed: Some(false),
        }));

        let update = rec.apply(MeshEvent::MqttToggled { id: 9, mqtt_exposed: true });
        assert_eq!(update, Update::GroupsChanged);
        assert!(store.group(9).unwrap().mqtt_exposed);
    }

    #[test]
    fn device_added_is_idempotent() {
        let (rec, store, _, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(6)));
        rec.apply(MeshEvent::DeviceAdded(seeded_device(6)));
        assert_eq!(store.device_count(), 1);
        assert_eq!(store.device(6).unwrap().brightness, Some(100));
    }

    #[test]
    fn transient_updates_carry_dwell_hints() {
        assert_eq!(Update::Saved.dwell(), Some(SAVE_DWELL));
        assert_eq!(
            Update::ClaimFailed { message: "no_available_ids".into() }.dwell(),
            Some(MESSAGE_DWELL)
        );
        assert_eq!(
            Update::Imported { added_devices: 1, added_groups: 0 }.dwell(),
            Some(MESSAGE_DWELL)
        );
        // Durable state changes never expire.
        assert_eq!(Update::DevicesChanged.dwell(), None);
        assert_eq!(Update::SyncComplete.dwell(), None);
    }

    #[test]
    fn removal_of_unknown_device_is_silent() {
        let (rec, _, _, _) = harness();
        assert_eq!(rec.apply(MeshEvent::DeviceRemoved { avion_id: 99 }), Update::None);
    }

    #[test]
    fn bulk_devices_merge_partially() {
        let (rec, store, _, _) = harness();
        rec.apply(MeshEvent::DeviceAdded(seeded_device(1)));

        // A later batch row naming only the name must not wipe state.
        rec.apply(MeshEvent::Devices(vec![DeviceRecord {
            avion_id: 1,
            name: Some("Renamed".into()),
            product_type: None,
            product_name: None,
            groups: None,
            mqtt_exposed: None,
            brightness: None,
            color_temp: None,
        }]));

        let dev = store.device(1).unwrap();
        assert_eq!(dev.name, "Renamed");
        assert_eq!(dev.brightness, Some(100));
        assert_eq!(dev.product, ProductType::SmartBulb);
    }

    #[test]
    fn scan_results_parse_and_disarm() {
        let (rec, _, _, tracker) = harness();
        tracker.begin_unassoc_scan().unwrap();

        let update = rec.apply(MeshEvent::ScanUnassoc(vec![
            "0x00c0ffee".into(),
            "garbage".into(),
            "0xdeadbeef".into(),
        ]));
        assert_eq!(update, Update::Candidates);
        assert!(!tracker.unassoc_scan_outstanding());
        assert_eq!(tracker.unassoc_candidates(), vec![0x00c0_ffee, 0xdead_beef]);
    }

    #[test]
    fn claim_success_resolves_and_prunes_candidate() {
        let (rec, _, _, tracker) = harness();
        tracker.complete_unassoc_scan(vec![0x1111_2222]);
        tracker.begin_claim(0x1111_2222).unwrap();

        let update = rec.apply(MeshEvent::ClaimResult(ClaimResultPayload {
            status: "ok".into(),
            device_id: Some(40),
            message: None,
        }));
        assert_eq!(update, Update::ClaimSucceeded { device_id: Some(40) });
        assert!(tracker.claim_outstanding().is_none());
        assert!(tracker.unassoc_candidates().is_empty());
    }

    #[test]
    fn claim_failure_keeps_candidate_and_reports_message() {
        let (rec, _, _, tracker) = harness();
        tracker.complete_unassoc_scan(vec![0x1111_2222]);
        tracker.begin_claim(0x1111_2222).unwrap();

        let update = rec.apply(MeshEvent::ClaimResult(ClaimResultPayload {
            status: "error".into(),
            device_id: None,
            message: Some("no_available_ids".into()),
        }));
        assert_eq!(update, Update::ClaimFailed { message: "no_available_ids".into() });
        assert_eq!(tracker.unassoc_candidates(), vec![0x1111_2222]);
    }
}
