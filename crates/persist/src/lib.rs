//! Persistence for streamed zones: entity codec, zone snapshots, staging.
//!
//! # Invariants
//! - A tombstoned identity is never simultaneously a live record in the
//!   same snapshot generation.
//! - A malformed payload restores as much as parses; it never errors past
//!   the object boundary.
//! - A missing temp file means "nothing to restore", not a failure.

pub mod codec;
pub mod snapshot;
pub mod staging;
pub mod store;

pub use codec::{decode_props_into, encode_props, CodecRegistry, DefaultCodec, EntityCodec};
pub use snapshot::{EntityRecord, RecordKind, RuntimeEntityRecord, ZoneSnapshot};
pub use staging::{decode_snapshot, encode_snapshot, Staging, StagingError, SAVE_FILE_EXT};
pub use store::SnapshotStore;
