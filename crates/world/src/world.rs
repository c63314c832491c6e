use crate::class::{ClassRegistry, ClassSpec};
use crate::entity::{Entity, Origin, SubObject};
use crate::zone::Zone;
use glam::Vec3;
use std::collections::BTreeMap;
use zonesave_common::{ClassRef, EntityId, Identity, Transform, ZoneName};

/// An event record produced by world mutations the save engine must observe.
///
/// Carried data is resolved at mutation time because the entity is gone by
/// the time the engine drains the log.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    EntityDestroyed {
        identity: Identity,
        /// Whether the destroy-notification hook was attached.
        hooked: bool,
        origin: Origin,
        home_zone: Option<ZoneName>,
        position: Vec3,
    },
}

/// The world: zones of build-data entities plus runtime spawns.
///
/// Single-writer main-context discipline: the save engine and the host both
/// mutate through `&mut World` on one thread; background tasks never touch
/// this type.
#[derive(Debug, Default)]
pub struct World {
    zones: BTreeMap<ZoneName, Zone>,
    runtime: BTreeMap<EntityId, Entity>,
    classes: ClassRegistry,
    /// First zone added; the whole-world zone for non-partitioned worlds.
    main_zone: Option<ZoneName>,
    authority: bool,
    partitioned: bool,
    spawn_counter: u64,
    events: Vec<WorldEvent>,
}

impl World {
    /// An authoritative, spatially-partitioned world.
    pub fn new() -> Self {
        Self {
            authority: true,
            partitioned: true,
            ..Default::default()
        }
    }

    /// A client replica: visibility transitions must not drive saves here.
    pub fn client_replica() -> Self {
        Self {
            authority: false,
            partitioned: true,
            ..Default::default()
        }
    }

    /// A single-zone world with no spatial partition.
    pub fn non_partitioned() -> Self {
        Self {
            authority: true,
            partitioned: false,
            ..Default::default()
        }
    }

    pub fn is_authority(&self) -> bool {
        self.authority
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    pub fn main_zone(&self) -> Option<&ZoneName> {
        self.main_zone.as_ref()
    }

    pub fn register_class(&mut self, spec: ClassSpec) {
        self.classes.register(spec);
    }

    pub fn class(&self, class: &ClassRef) -> Option<&ClassSpec> {
        self.classes.get(class)
    }

    /// Add a zone by package path; returns its stable name.
    pub fn add_zone(&mut self, package: impl Into<String>) -> ZoneName {
        let zone = Zone::new(package);
        let name = zone.name().clone();
        if self.main_zone.is_none() {
            self.main_zone = Some(name.clone());
        }
        self.zones.insert(name.clone(), zone);
        name
    }

    pub fn zone(&self, name: &ZoneName) -> Option<&Zone> {
        self.zones.get(name)
    }

    pub fn zone_mut(&mut self, name: &ZoneName) -> Option<&mut Zone> {
        self.zones.get_mut(name)
    }

    /// Unload a zone's container. Entities vanish without destroy events;
    /// streaming out is not destruction.
    pub fn remove_zone(&mut self, name: &ZoneName) -> bool {
        self.zones.remove(name).is_some()
    }

    pub fn zone_names(&self) -> Vec<ZoneName> {
        self.zones.keys().cloned().collect()
    }

    /// Place a build-data entity into a zone. The hierarchical path (and
    /// with it the entity's identity) derives from the zone package and the
    /// entity name, so it is identical every time the zone loads.
    pub fn spawn_static(
        &mut self,
        zone_name: &ZoneName,
        name: &str,
        class: &ClassRef,
    ) -> Option<EntityId> {
        let spec = self.classes.get(class)?.clone();
        let zone = self.zones.get_mut(zone_name)?;
        let path = format!("{}:{}", zone.package(), name);
        let sub_objects = build_sub_objects(&spec, &path);
        let entity = Entity {
            id: EntityId::new(),
            name: name.to_string(),
            path,
            class: class.clone(),
            transform: Transform::default(),
            velocity: Vec3::ZERO,
            origin: Origin::Static,
            home_zone: Some(zone_name.clone()),
            template: false,
            being_destroyed: false,
            persistable: spec.persistable,
            runtime_tracked: spec.runtime_tracked,
            destroy_hook: false,
            post_load_count: 0,
            props: spec.props.clone(),
            sub_objects,
        };
        let id = entity.id;
        zone.insert(entity);
        Some(id)
    }

    /// Spawn a runtime entity of the given class at a transform.
    ///
    /// Always-spawn policy: placement is never blocked by overlaps. Returns
    /// None only when the class is not registered.
    pub fn spawn_runtime(&mut self, class: &ClassRef, transform: Transform) -> Option<EntityId> {
        let spec = self.classes.get(class)?.clone();
        self.spawn_counter += 1;
        let name = format!("{}_{}", spec.short_name(), self.spawn_counter);
        let sub_objects = build_sub_objects(&spec, &name);
        let entity = Entity {
            id: EntityId::new(),
            name,
            path: String::new(),
            class: class.clone(),
            transform,
            velocity: Vec3::ZERO,
            origin: Origin::Runtime,
            home_zone: None,
            template: false,
            being_destroyed: false,
            persistable: spec.persistable,
            runtime_tracked: spec.runtime_tracked,
            destroy_hook: false,
            post_load_count: 0,
            props: spec.props.clone(),
            sub_objects,
        };
        let id = entity.id;
        self.runtime.insert(id, entity);
        Some(id)
    }

    pub fn runtime_entity_ids(&self) -> Vec<EntityId> {
        self.runtime.keys().copied().collect()
    }

    pub fn runtime_entity_count(&self) -> usize {
        self.runtime.len()
    }

    /// Look an entity up anywhere: runtime set first, then every zone.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.runtime
            .get(&id)
            .or_else(|| self.zones.values().find_map(|z| z.entity(id)))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.runtime.contains_key(&id) {
            return self.runtime.get_mut(&id);
        }
        self.zones.values_mut().find_map(|z| z.entity_mut(id))
    }

    /// Destroy an entity, tearing down its sub-objects with it, and log the
    /// destruction for the save engine.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let removed = match self.runtime.remove(&id) {
            Some(e) => Some(e),
            None => self.zones.values_mut().find_map(|z| z.remove(id)),
        };
        let Some(entity) = removed else {
            return false;
        };
        tracing::debug!(name = %entity.name, hooked = entity.destroy_hook, "entity destroyed");
        self.events.push(WorldEvent::EntityDestroyed {
            identity: entity.identity(),
            hooked: entity.destroy_hook,
            origin: entity.origin,
            home_zone: entity.home_zone.clone(),
            position: entity.transform.position,
        });
        true
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }
}

fn build_sub_objects(spec: &ClassSpec, owner_path: &str) -> Vec<SubObject> {
    spec.sub_objects
        .iter()
        .map(|s| SubObject {
            name: s.name.clone(),
            path: format!("{owner_path}.{}", s.name),
            persistable: s.persistable,
            props: s.props.clone(),
        })
        .collect()
}
