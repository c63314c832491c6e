//! Two-stage disk pipeline.
//!
//! Layout under the saved-games root:
//! ```text
//! <root>/TempLevels/<zone>.sav        - scratch captures, one blob per zone
//! <root>/<slot>/Levels/<zone>.sav     - durable save-slot copies
//! ```
//! Snapshots land in the scratch area as zones stream out; a completed save
//! sequence merges scratch into the slot, and beginning a load merges the
//! slot back into scratch so zone loads never special-case their source.

use crate::snapshot::ZoneSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};
use zonesave_common::ZoneName;

/// Extension for per-zone blobs, scratch and slot alike.
pub const SAVE_FILE_EXT: &str = "sav";

/// Errors from staging I/O. Absence is never one of them.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Encode(String),
}

/// Path logic plus the file operations of the two-stage pipeline.
///
/// Cheap to clone (paths only), so background flush tasks carry their own
/// copy and never share state with the main context.
#[derive(Debug, Clone)]
pub struct Staging {
    saved_games_root: PathBuf,
    temp_folder: String,
    zones_folder: String,
}

impl Staging {
    pub fn new(
        saved_games_root: impl Into<PathBuf>,
        temp_folder: impl Into<String>,
        zones_folder: impl Into<String>,
    ) -> Self {
        Self {
            saved_games_root: saved_games_root.into(),
            temp_folder: temp_folder.into(),
            zones_folder: zones_folder.into(),
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.saved_games_root.join(&self.temp_folder)
    }

    pub fn slot_dir(&self, slot: &str) -> PathBuf {
        self.saved_games_root.join(slot)
    }

    pub fn slot_zones_dir(&self, slot: &str) -> PathBuf {
        self.slot_dir(slot).join(&self.zones_folder)
    }

    pub fn temp_file_path(&self, zone: &ZoneName) -> PathBuf {
        self.temp_dir()
            .join(format!("{}.{SAVE_FILE_EXT}", zone.as_str()))
    }

    /// Serialize a zone snapshot into the scratch area, overwriting any
    /// previous capture of the zone.
    pub fn write_temp(&self, zone: &ZoneName, snapshot: &ZoneSnapshot) -> Result<(), StagingError> {
        if zone.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(self.temp_dir())?;
        let bytes = encode_snapshot(snapshot)?;
        std::fs::write(self.temp_file_path(zone), bytes)?;
        Ok(())
    }

    /// Read a zone's scratch capture. A missing file means the zone was
    /// never captured: Ok(None). A file that fails to decode is treated the
    /// same way (absent-or-valid), with a warning.
    pub fn read_temp(&self, zone: &ZoneName) -> Result<Option<ZoneSnapshot>, StagingError> {
        let path = self.temp_file_path(zone);
        if zone.is_empty() || !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(decode_snapshot(&bytes))
    }

    /// Copy every scratch file into the slot's zones directory, one-for-one.
    /// Re-running with unchanged scratch contents is a no-op in effect.
    pub fn merge_temp_into_slot(&self, slot: &str) -> Result<(), StagingError> {
        let dest = self.slot_zones_dir(slot);
        std::fs::create_dir_all(&dest)?;
        copy_files(&self.temp_dir(), &dest)
    }

    /// Copy the slot's zone files into the scratch area so subsequent zone
    /// loads read slot data through the ordinary temp path.
    pub fn merge_slot_into_temp(&self, slot: &str) -> Result<(), StagingError> {
        let dest = self.temp_dir();
        std::fs::create_dir_all(&dest)?;
        copy_files(&self.slot_zones_dir(slot), &dest)
    }

    /// Recursively delete the scratch area.
    pub fn clear_temp(&self) -> Result<(), StagingError> {
        match std::fs::remove_dir_all(self.temp_dir()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// File names currently staged in the scratch area, sorted.
    pub fn list_temp_files(&self) -> Vec<String> {
        list_files(&self.temp_dir())
    }

    /// File names currently stored under a slot's zones directory, sorted.
    pub fn list_slot_files(&self, slot: &str) -> Vec<String> {
        list_files(&self.slot_zones_dir(slot))
    }
}

/// CBOR-encode a snapshot for disk.
pub fn encode_snapshot(snapshot: &ZoneSnapshot) -> Result<Vec<u8>, StagingError> {
    let mut buf = Vec::new();
    cbor_into_writer(snapshot, &mut buf)?;
    Ok(buf)
}

/// Decode a snapshot blob; None when the bytes do not parse.
pub fn decode_snapshot(bytes: &[u8]) -> Option<ZoneSnapshot> {
    match ciborium::from_reader(bytes) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            tracing::warn!(%err, "discarding undecodable zone blob");
            None
        }
    }
}

fn cbor_into_writer<T: Serialize>(value: &T, buf: &mut Vec<u8>) -> Result<(), StagingError> {
    ciborium::into_writer(value, buf).map_err(|e| StagingError::Encode(e.to_string()))
}

fn copy_files(from: &Path, to: &Path) -> Result<(), StagingError> {
    if !from.is_dir() {
        // Source never populated; nothing to merge.
        return Ok(());
    }
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            std::fs::copy(entry.path(), to.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesave_common::Identity;

    fn staging(root: &Path) -> Staging {
        Staging::new(root, "TempLevels", "Levels")
    }

    fn sample_snapshot() -> ZoneSnapshot {
        let mut snap = ZoneSnapshot::new();
        snap.record_entity(Identity::from_name("Chest_1"), vec![0x01, 0x02]);
        snap.record_destroyed(Identity::from_name("Barrel_3"));
        snap
    }

    #[test]
    fn write_then_read_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        let zone = ZoneName::new("Forest_01");
        staging.write_temp(&zone, &sample_snapshot()).unwrap();
        let loaded = staging.read_temp(&zone).unwrap().unwrap();
        assert_eq!(loaded, sample_snapshot());
    }

    #[test]
    fn absent_temp_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        assert!(staging
            .read_temp(&ZoneName::new("Never_Captured"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_temp_file_reads_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        let zone = ZoneName::new("Forest_01");
        std::fs::create_dir_all(staging.temp_dir()).unwrap();
        std::fs::write(staging.temp_file_path(&zone), b"not cbor at all").unwrap();
        assert!(staging.read_temp(&zone).unwrap().is_none());
    }

    #[test]
    fn write_overwrites_previous_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        let zone = ZoneName::new("Forest_01");
        staging.write_temp(&zone, &sample_snapshot()).unwrap();
        let mut second = ZoneSnapshot::new();
        second.record_entity(Identity::from_name("Chest_1"), vec![0xff]);
        staging.write_temp(&zone, &second).unwrap();
        assert_eq!(staging.read_temp(&zone).unwrap().unwrap(), second);
    }

    #[test]
    fn empty_zone_name_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        staging
            .write_temp(&ZoneName::new(""), &sample_snapshot())
            .unwrap();
        assert!(staging.list_temp_files().is_empty());
        assert!(staging.read_temp(&ZoneName::new("")).unwrap().is_none());
    }

    #[test]
    fn merge_temp_into_slot_copies_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        staging
            .write_temp(&ZoneName::new("Forest_01"), &sample_snapshot())
            .unwrap();
        staging
            .write_temp(&ZoneName::new("Cave_02"), &ZoneSnapshot::new())
            .unwrap();
        staging.merge_temp_into_slot("Slot1").unwrap();
        assert_eq!(
            staging.list_slot_files("Slot1"),
            vec!["Cave_02.sav".to_string(), "Forest_01.sav".to_string()]
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        staging
            .write_temp(&ZoneName::new("Forest_01"), &sample_snapshot())
            .unwrap();
        staging.merge_temp_into_slot("Slot1").unwrap();
        let first = staging.list_slot_files("Slot1");
        let bytes_first =
            std::fs::read(staging.slot_zones_dir("Slot1").join("Forest_01.sav")).unwrap();
        staging.merge_temp_into_slot("Slot1").unwrap();
        assert_eq!(staging.list_slot_files("Slot1"), first);
        let bytes_second =
            std::fs::read(staging.slot_zones_dir("Slot1").join("Forest_01.sav")).unwrap();
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn merge_slot_into_temp_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        let zone = ZoneName::new("Forest_01");
        staging.write_temp(&zone, &sample_snapshot()).unwrap();
        staging.merge_temp_into_slot("Slot1").unwrap();
        staging.clear_temp().unwrap();
        assert!(staging.read_temp(&zone).unwrap().is_none());

        staging.merge_slot_into_temp("Slot1").unwrap();
        assert_eq!(staging.read_temp(&zone).unwrap().unwrap(), sample_snapshot());
    }

    #[test]
    fn merge_from_missing_slot_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        staging.merge_slot_into_temp("NoSuchSlot").unwrap();
        assert!(staging.list_temp_files().is_empty());
    }

    #[test]
    fn clear_temp_removes_scratch() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = staging(tmp.path());
        staging
            .write_temp(&ZoneName::new("Forest_01"), &sample_snapshot())
            .unwrap();
        staging.clear_temp().unwrap();
        assert!(!staging.temp_dir().exists());
        // Clearing twice is fine.
        staging.clear_temp().unwrap();
    }
}
