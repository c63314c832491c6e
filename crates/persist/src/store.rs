use crate::snapshot::ZoneSnapshot;
use std::collections::BTreeMap;
use zonesave_common::ZoneName;

/// In-memory accumulator for zone snapshots that have not been flushed yet.
///
/// Owned by the save engine and mutated only on the main context. The
/// hand-off to a background flush is remove-then-move: the snapshot leaves
/// this store before the task launches, so no two flushes can ever share
/// one snapshot and a later capture for the same zone starts fresh.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    pending: BTreeMap<ZoneName, ZoneSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the snapshot for a zone. The empty zone name is
    /// not a zone; it yields None.
    pub fn get_or_create(&mut self, zone: &ZoneName) -> Option<&mut ZoneSnapshot> {
        if zone.is_empty() {
            return None;
        }
        Some(self.pending.entry(zone.clone()).or_default())
    }

    pub fn get(&self, zone: &ZoneName) -> Option<&ZoneSnapshot> {
        self.pending.get(zone)
    }

    /// Remove and return a zone's snapshot; the flush hand-off point.
    pub fn remove(&mut self, zone: &ZoneName) -> Option<ZoneSnapshot> {
        self.pending.remove(zone)
    }

    pub fn contains(&self, zone: &ZoneName) -> bool {
        self.pending.contains_key(zone)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn zone_names(&self) -> Vec<ZoneName> {
        self.pending.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazily_creates_per_zone() {
        let mut store = SnapshotStore::new();
        let zone = ZoneName::new("Forest_01");
        assert!(store.get(&zone).is_none());
        store.get_or_create(&zone).unwrap();
        assert!(store.contains(&zone));
        assert_eq!(store.len(), 1);
        // Second call returns the same snapshot, not a fresh one.
        store
            .get_or_create(&zone)
            .unwrap()
            .record_destroyed(zonesave_common::Identity::from_name("Chest_1"));
        assert_eq!(store.get(&zone).unwrap().destroyed.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_zone_name_is_refused() {
        let mut store = SnapshotStore::new();
        assert!(store.get_or_create(&ZoneName::new("")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_hands_off_the_snapshot() {
        let mut store = SnapshotStore::new();
        let zone = ZoneName::new("Forest_01");
        store.get_or_create(&zone).unwrap().record_entity(
            zonesave_common::Identity::from_name("Chest_1"),
            vec![1, 2],
        );
        let snap = store.remove(&zone).unwrap();
        assert_eq!(snap.records.len(), 1);
        assert!(!store.contains(&zone));
        // A new capture after the hand-off starts from scratch.
        assert!(store.get_or_create(&zone).unwrap().is_empty());
    }
}
