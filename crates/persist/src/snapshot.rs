use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use zonesave_common::{ClassRef, Identity, Transform};

/// Whether a record captured an entity or one of its sub-objects.
///
/// A tag, not a type: both live in the same flat identity-keyed mapping
/// because sub-objects have no independent spawn/destroy handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Entity,
    SubObject,
}

/// One captured object: an opaque payload under a stable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

/// Everything needed to recreate a runtime-spawned entity from nothing:
/// class (resolved lazily at restore), placement, motion, sub-object
/// payloads keyed by their name-derived identities, and the entity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEntityRecord {
    pub class: ClassRef,
    pub transform: Transform,
    pub velocity: Vec3,
    pub sub_objects: BTreeMap<Identity, Vec<u8>>,
    pub payload: Vec<u8>,
}

/// The captured state of one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Tombstones: persistent entities destroyed in-session. Restoring the
    /// zone destroys these instead of applying any payload.
    pub destroyed: BTreeSet<Identity>,
    /// Flat identity-keyed mapping of entity and sub-object records.
    pub records: BTreeMap<Identity, EntityRecord>,
    /// Runtime-spawned entities, in capture order.
    pub runtime: Vec<RuntimeEntityRecord>,
}

impl ZoneSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live entity capture. Clears any stale tombstone for the
    /// identity: an entity alive at capture time is by definition not
    /// destroyed.
    pub fn record_entity(&mut self, identity: Identity, payload: Vec<u8>) {
        self.destroyed.remove(&identity);
        self.records.insert(
            identity,
            EntityRecord {
                kind: RecordKind::Entity,
                payload,
            },
        );
    }

    pub fn record_sub_object(&mut self, identity: Identity, payload: Vec<u8>) {
        self.destroyed.remove(&identity);
        self.records.insert(
            identity,
            EntityRecord {
                kind: RecordKind::SubObject,
                payload,
            },
        );
    }

    /// Record a destruction. Destroy wins: any live record under the same
    /// identity is dropped.
    pub fn record_destroyed(&mut self, identity: Identity) {
        self.records.remove(&identity);
        self.destroyed.insert(identity);
    }

    pub fn push_runtime(&mut self, record: RuntimeEntityRecord) {
        self.runtime.push(record);
    }

    pub fn record(&self, identity: &Identity) -> Option<&EntityRecord> {
        self.records.get(identity)
    }

    pub fn is_destroyed(&self, identity: &Identity) -> bool {
        self.destroyed.contains(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.destroyed.is_empty() && self.records.is_empty() && self.runtime.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identity {
        Identity::from_name(name)
    }

    #[test]
    fn destroy_wins_over_record() {
        let mut snap = ZoneSnapshot::new();
        snap.record_entity(id("Chest_1"), vec![1, 2]);
        snap.record_destroyed(id("Chest_1"));
        assert!(snap.is_destroyed(&id("Chest_1")));
        assert!(snap.record(&id("Chest_1")).is_none());
    }

    #[test]
    fn live_capture_clears_stale_tombstone() {
        let mut snap = ZoneSnapshot::new();
        snap.record_destroyed(id("Chest_1"));
        snap.record_entity(id("Chest_1"), vec![1]);
        assert!(!snap.is_destroyed(&id("Chest_1")));
        assert_eq!(snap.record(&id("Chest_1")).unwrap().payload, vec![1]);
    }

    #[test]
    fn tombstones_and_records_stay_disjoint() {
        let mut snap = ZoneSnapshot::new();
        for i in 0..10 {
            let identity = id(&format!("Entity_{i}"));
            snap.record_entity(identity, vec![i as u8]);
            if i % 2 == 0 {
                snap.record_destroyed(identity);
            }
        }
        for identity in &snap.destroyed {
            assert!(!snap.records.contains_key(identity));
        }
    }

    #[test]
    fn record_kinds_share_the_flat_mapping() {
        let mut snap = ZoneSnapshot::new();
        snap.record_entity(id("Chest_1"), vec![]);
        snap.record_sub_object(id("Chest_1.Lock"), vec![]);
        assert_eq!(snap.records.len(), 2);
        assert_eq!(
            snap.record(&id("Chest_1")).unwrap().kind,
            RecordKind::Entity
        );
        assert_eq!(
            snap.record(&id("Chest_1.Lock")).unwrap().kind,
            RecordKind::SubObject
        );
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        let mut snap = ZoneSnapshot::new();
        assert!(snap.is_empty());
        snap.push_runtime(RuntimeEntityRecord {
            class: ClassRef::new("/Game/Classes/Crate"),
            transform: Transform::default(),
            velocity: Vec3::ZERO,
            sub_objects: BTreeMap::new(),
            payload: Vec::new(),
        });
        assert!(!snap.is_empty());
    }
}
