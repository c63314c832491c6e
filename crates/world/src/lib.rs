//! World glue for the zonesave engine: entities, zones, runtime spawning.
//!
//! # Invariants
//! - All entity mutation, spawning, and destruction happens on the owning
//!   (main) context; nothing here is thread-safe by design.
//! - Every destruction is recorded in the world event log so the save engine
//!   can observe it.
//! - Zone names are stable across sessions; entity ids are not.

pub mod class;
pub mod entity;
pub mod provider;
pub mod world;
pub mod zone;

pub use class::{ClassRegistry, ClassSpec, SubObjectSpec};
pub use entity::{Entity, Origin, PropertyBag, PropertyValue, SubObject};
pub use provider::{ZoneExtents, ZoneIndex, ZoneProvider};
pub use world::{World, WorldEvent};
pub use zone::Zone;
