use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zonesave_common::{ClassRef, EntityId, Identity, Transform, ZoneName};

/// Where an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Part of the zone's original build data; exists again after every
    /// zone load without any spawning on our side.
    Static,
    /// Spawned during play; must be recreated from its saved record.
    Runtime,
}

/// A typed field value in an entity's declared field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vec3(Vec3),
    Quat(Quat),
    Str(String),
    Bytes(Vec<u8>),
}

/// An entity's declared fields, keyed by name.
///
/// The default codec walks this bag generically. Deterministic iteration
/// order (BTreeMap) keeps captured payloads byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag(BTreeMap<String, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for declaring class defaults.
    pub fn with(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PropertyValue> {
        self.0.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A sub-object attached to an entity (inventory, health block, ...).
///
/// Sub-objects have no independent spawn or destroy handling; they ride
/// along with their owner and are keyed by their own identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubObject {
    /// Locally-unique runtime name within the owner.
    pub name: String,
    /// Full hierarchical path; meaningful only for static owners.
    pub path: String,
    /// Whether this sub-object opts into persistence.
    pub persistable: bool,
    pub props: PropertyBag,
}

/// One world entity.
///
/// Deliberately flat: persistent-vs-runtime is the [`Origin`] tag and the
/// persistence capability is a flag plus a valid identity, not a type
/// hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Locally-unique runtime name, e.g. `Crate_17`.
    pub name: String,
    /// Full hierarchical path from build data; empty for runtime spawns.
    pub path: String,
    pub class: ClassRef,
    pub transform: Transform,
    pub velocity: Vec3,
    pub origin: Origin,
    /// Zone the entity was built into. None for runtime spawns, whose
    /// associate zone is resolved by position instead.
    pub home_zone: Option<ZoneName>,
    /// Class-default template object; never captured.
    pub template: bool,
    pub being_destroyed: bool,
    /// Whether this entity opts into persistence at all.
    pub persistable: bool,
    /// Whether this entity carries the runtime-save tracking component.
    pub runtime_tracked: bool,
    /// Whether the destroy-notification hook is attached. Detached during a
    /// capture so the unload itself does not record tombstones; re-attached
    /// on restore.
    pub destroy_hook: bool,
    /// Incremented by the post-restore notification hook.
    pub post_load_count: u32,
    pub props: PropertyBag,
    pub sub_objects: Vec<SubObject>,
}

impl Entity {
    /// Resolve this entity's stable identity.
    ///
    /// Runtime spawns derive from their locally-unique name, build-data
    /// entities from their full path. Unnameable objects resolve invalid.
    pub fn identity(&self) -> Identity {
        match self.origin {
            Origin::Runtime => Identity::from_name(&self.name),
            Origin::Static => Identity::from_name(&self.path),
        }
    }

    /// Resolve a sub-object's identity under this owner.
    pub fn sub_object_identity(&self, sub: &SubObject) -> Identity {
        match self.origin {
            Origin::Runtime => Identity::from_name(&sub.name),
            Origin::Static => Identity::from_name(&sub.path),
        }
    }

    /// Capability filter: Some(identity) iff the entity opts into
    /// persistence and resolves a valid identity. Pure; no side effects.
    pub fn persistable_identity(&self) -> Option<Identity> {
        if !self.persistable {
            return None;
        }
        let id = self.identity();
        id.is_valid().then_some(id)
    }

    /// Whether a capture/restore walk should consider this entity at all.
    pub fn is_walk_candidate(&self) -> bool {
        !self.template && !self.being_destroyed
    }

    /// Post-restore notification hook.
    pub fn on_post_load(&mut self) {
        self.post_load_count += 1;
    }
}
