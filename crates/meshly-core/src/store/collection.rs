// ── Generic reactive entity collection ──
//
// Ordered storage with merge-aware upserts and push-based change
// notification via `watch` channels.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tokio::sync::watch;

/// A reactive, insertion-ordered collection for a single entity type.
///
/// Entities keep the order in which they first arrived, so list views
/// stay stable across partial updates -- a record never jumps position
/// just because it changed. Every mutation bumps a version counter and
/// rebuilds the snapshot subscribers receive.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    entries: RwLock<IndexMap<u16, Arc<T>>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self { entries: RwLock::new(IndexMap::new()), version, snapshot }
    }

    /// Insert or merge an entity. `merge` is called with the existing
    /// entry when the id is already present; otherwise `make` builds a
    /// fresh one. Returns `true` if the id was new.
    pub(crate) fn upsert_with(
        &self,
        id: u16,
        make: impl FnOnce() -> T,
        merge: impl FnOnce(&T) -> T,
    ) -> bool {
        let is_new = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&id) {
                Some(existing) => {
                    let merged = merge(existing);
                    entries.insert(id, Arc::new(merged));
                    false
                }
                None => {
                    entries.insert(id, Arc::new(make()));
                    true
                }
            }
        };

        self.rebuild_snapshot();
        self.bump_version();
        is_new
    }

    /// Remove an entity. Returns the removed entity if it existed;
    /// removing an absent id is a no-op and notifies nobody.
    pub(crate) fn remove(&self, id: u16) -> Option<Arc<T>> {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            // shift_remove preserves the order of the survivors.
            entries.shift_remove(&id)
        };
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub(crate) fn get(&self, id: u16) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(Arc::clone)
    }

    pub(crate) fn contains(&self, id: u16) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(&id)
    }

    /// Get the current snapshot (cheap `Arc` clone), in arrival order.
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<T>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Arc::clone)
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    /// Increment the version counter.
    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn insert(col: &EntityCollection<String>, id: u16, value: &str) -> bool {
        let v = value.to_owned();
        col.upsert_with(id, || v.clone(), |_| v.clone())
    }

    #[test]
    fn upsert_returns_true_for_new_id() {
        let col: EntityCollection<String> = EntityCollection::new();
        assert!(insert(&col, 1, "hello"));
    }

    #[test]
    fn upsert_returns_false_for_existing_id() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 1, "hello");
        assert!(!insert(&col, 1, "world"));
        assert_eq!(*col.get(1).unwrap(), "world");
    }

    #[test]
    fn merge_sees_existing_entry() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 1, "hello");
        col.upsert_with(1, || "fresh".into(), |old| format!("{old}!"));
        assert_eq!(*col.get(1).unwrap(), "hello!");
    }

    #[test]
    fn remove_is_idempotent() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 1, "hello");

        assert_eq!(*col.remove(1).unwrap(), "hello");
        assert!(col.remove(1).is_none());
        assert!(col.get(1).is_none());
        assert!(col.is_empty());
    }

    #[test]
    fn snapshot_preserves_arrival_order() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 30, "c");
        insert(&col, 10, "a");
        insert(&col, 20, "b");

        // Update an early entry; it must not move.
        insert(&col, 30, "c2");

        let snap = col.snapshot();
        let order: Vec<&str> = snap.iter().map(|s| s.as_str()).collect();
        assert_eq!(order, ["c2", "a", "b"]);
    }

    #[test]
    fn remove_keeps_survivor_order() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 1, "a");
        insert(&col, 2, "b");
        insert(&col, 3, "c");

        col.remove(2);
        let snap = col.snapshot();
        let order: Vec<&str> = snap.iter().map(|s| s.as_str()).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn clear_empties_everything() {
        let col: EntityCollection<String> = EntityCollection::new();
        insert(&col, 1, "x");
        insert(&col, 2, "y");
        assert_eq!(col.len(), 2);

        col.clear();
        assert!(col.is_empty());
        assert!(col.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_mutations() {
        let col: EntityCollection<String> = EntityCollection::new();
        let mut rx = col.subscribe();

        insert(&col, 1, "x");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
