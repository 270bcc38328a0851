use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserSettings {
    /// Whether utterances may be routed to the assistant gateway.
    assistant_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            assistant_mode: true,
        }
    }
}

/// JSON-file-backed user preferences, read at startup and written on toggle.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn assistant_mode(&self) -> bool {
        self.data.read().unwrap().assistant_mode
    }

    pub fn set_assistant_mode(&self, enabled: bool) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.assistant_mode = enabled;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_assistant_mode_on() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.assistant_mode());
    }

    #[test]
    fn toggle_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        {
            let store = SettingsStore::new(path.clone()).unwrap();
            store.set_assistant_mode(false).unwrap();
        }
        let reloaded = SettingsStore::new(path).unwrap();
        assert!(!reloaded.assistant_mode());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert!(store.assistant_mode());
    }
}
