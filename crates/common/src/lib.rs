//! Shared types for the zonesave engine.
//!
//! # Invariants
//! - Identity derivation is deterministic: same name in, same identity out,
//!   across runs and platforms.
//! - Zone names are stable across editor-preview and cooked builds.

pub mod identity;
pub mod types;

pub use identity::{zone_name_from_package, Identity};
pub use types::{ClassRef, EntityId, Transform, ZoneName};
