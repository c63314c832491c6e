//! Save/load sequence state and host extension points.

/// An active save or load sequence. At most one exists at a time; a second
/// begin while one is active is ignored.
#[derive(Debug, Clone)]
pub struct SaveSequence {
    pub slot: String,
    pub saving: bool,
}

/// Host hooks around sequence boundaries.
///
/// The default implementation accepts any non-empty slot name and does
/// nothing at the boundaries; hosts override to stage UI, screenshots, or
/// slot metadata of their own.
pub trait SequenceHandler: Send {
    fn slot_name_valid(&self, slot: &str) -> bool {
        !slot.is_empty()
    }

    fn begin_save(&mut self, _slot: &str) {}

    fn begin_load(&mut self, _slot: &str) {}
}

#[derive(Debug, Default)]
pub struct DefaultSequenceHandler;

impl SequenceHandler for DefaultSequenceHandler {}

/// Notifications the engine emits for the host to drain each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveNotification {
    PreSave,
    SaveComplete,
    PreLoad,
    LoadComplete,
    /// A screenshot the host captured for the slot, handed through so UI
    /// code can persist or display it.
    ScreenshotCaptured { png: Vec<u8> },
}
