//! JSON snapshot of the engine state.
//!
//! The whole [`EngineState`] lives in one `state.json` next to the config.
//! Writes go through a temporary file and a rename so a crash never leaves
//! a half-written snapshot behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{debug, warn};

use super::data_dir;
use crate::engine::EngineState;
use crate::error::{CoreError, StorageError};

const STATE_FILE: &str = "state.json";

/// File-backed store for [`EngineState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store at `<data_dir>/state.json`.
    pub fn open() -> Result<Self, CoreError> {
        Ok(Self::at(data_dir()?.join(STATE_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file yields fresh state at `now`. Content that does not
    /// parse is discarded with a warning; parts that parse but fail
    /// validation are replaced individually.
    ///
    /// # Errors
    /// Returns an error only if the file exists but cannot be read.
    pub fn load<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<EngineState, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet, starting fresh");
                return Ok(EngineState::new(now));
            }
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Ok(EngineState::rehydrate(value, now)),
            Err(e) => {
                warn!(path = %self.path.display(), "discarding unreadable snapshot: {e}");
                Ok(EngineState::new(now))
            }
        }
    }

    /// Write the state atomically.
    pub fn save(&self, state: &EngineState) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        let write_failed = |source| StorageError::WriteFailed {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        std::fs::write(&tmp, content).map_err(write_failed)?;
        std::fs::rename(&tmp, &self.path).map_err(write_failed)?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::{Completion, EnergySource};
    use chrono::Utc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_file_yields_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at(dir.path().join("state.json"));
        let state = store.load(&now()).unwrap();
        assert_eq!(state, EngineState::new(&now()));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::at(dir.path().join("state.json"));
        let mut state = EngineState::new(&now());
        state.energy = state
            .energy
            .add_energy(&Completion::new(EnergySource::Goals, 50, "ship"), &now());
        store.save(&state).unwrap();

        let loaded = store.load(&now()).unwrap();
        assert_eq!(loaded, state);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_yields_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let state = StateStore::at(&path).load(&now()).unwrap();
        assert_eq!(state, EngineState::new(&now()));
    }

    #[test]
    fn test_invalid_energy_part_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut json = serde_json::to_value(EngineState::new(&now())).unwrap();
        json["energy"]["total_energy"] = serde_json::json!(-5);
        std::fs::write(&path, json.to_string()).unwrap();

        let state = StateStore::at(&path).load(&now()).unwrap();
        assert_eq!(state.energy.total_energy, 0);
    }
}
