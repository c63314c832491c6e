use crate::entity::Entity;
use std::collections::BTreeMap;
use zonesave_common::{zone_name_from_package, EntityId, ZoneName};

/// One streaming zone: a spatially-bounded unit of the world that loads and
/// unloads independently, holding its build-data entities.
#[derive(Debug, Clone)]
pub struct Zone {
    package: String,
    name: ZoneName,
    entities: BTreeMap<EntityId, Entity>,
}

impl Zone {
    pub fn new(package: impl Into<String>) -> Self {
        let package = package.into();
        let name = ZoneName::new(zone_name_from_package(&package));
        Self {
            package,
            name,
            entities: BTreeMap::new(),
        }
    }

    /// Package path the zone was built from.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Stable name, preview markers already stripped.
    pub fn name(&self) -> &ZoneName {
        &self.name
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_name_derived_from_package() {
        let z = Zone::new("/Game/Maps/Preview_0_Forest_01");
        assert_eq!(z.name().as_str(), "Forest_01");
        assert_eq!(z.package(), "/Game/Maps/Preview_0_Forest_01");
        assert_eq!(z.entity_count(), 0);
    }
}
