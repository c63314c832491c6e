use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Save-engine configuration.
///
/// Loaded from JSON by hosts that carry a config file; every field has a
/// default so partial files and `SaveSettings::default()` both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    /// Master switch. A disabled engine turns every operation into a no-op.
    pub enabled: bool,
    /// Delete the scratch area when the engine tears down.
    pub clear_temp_on_teardown: bool,
    /// Scratch folder name under the saved-games root.
    pub temp_folder: String,
    /// Per-slot zones folder name.
    pub zones_folder: String,
    /// Root directory for all save data.
    pub saved_games_root: PathBuf,
    /// Background flush threads.
    pub workers: usize,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            clear_temp_on_teardown: false,
            temp_folder: "TempLevels".to_string(),
            zones_folder: "Levels".to_string(),
            saved_games_root: PathBuf::from("Saved/SaveGames"),
            workers: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SaveSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Builder-style root override, mostly for hosts that relocate saves.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.saved_games_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_enabled() {
        let s = SaveSettings::default();
        assert!(s.enabled);
        assert!(!s.clear_temp_on_teardown);
        assert_eq!(s.temp_folder, "TempLevels");
        assert_eq!(s.zones_folder, "Levels");
        assert!(s.workers >= 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: SaveSettings = serde_json::from_str(r#"{ "enabled": false }"#).unwrap();
        assert!(!s.enabled);
        assert_eq!(s.temp_folder, "TempLevels");
    }

    #[test]
    fn load_reads_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save.json");
        std::fs::write(&path, r#"{ "workers": 4, "clear_temp_on_teardown": true }"#).unwrap();
        let s = SaveSettings::load(&path).unwrap();
        assert_eq!(s.workers, 4);
        assert!(s.clear_temp_on_teardown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            SaveSettings::load(&path),
            Err(SettingsError::Parse(_))
        ));
    }
}
