//! Save/load orchestration for streamed worlds.
//!
//! The engine owns the pending-snapshot store, the two-stage disk pipeline,
//! the codec registry, and a background flush pool. Hosts drive it through
//! lifecycle calls (zone visibility transitions, world load/unload, save
//! and load sequences) and pump it once per frame so background work can
//! re-enter the main context.

pub mod engine;
pub mod sequence;
pub mod settings;
pub mod workers;

pub use engine::SaveEngine;
pub use sequence::{DefaultSequenceHandler, SaveNotification, SaveSequence, SequenceHandler};
pub use settings::{SaveSettings, SettingsError};
pub use workers::{MainTask, WorkerPool};
