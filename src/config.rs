//! Run settings and their JSON persistence
//!
//! The configuration window owns editing; the engine only takes a
//! [`Settings`] snapshot per cycle and bumps the two lifetime counters.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::screen_reader::Region;
use crate::utils::keybinds::{SC_ESC, SC_F10, SC_SPACE};

/// All settings read by the bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Loudness (0-100) above which a sample counts as the splash
    pub splash_threshold: f64,
    /// Mean wait in ms between finding the bobber and moving the pointer
    pub reaction_time: u64,
    /// Falls back to `interact_key` when unset
    pub cast_key: Option<u16>,
    pub interact_key: u16,
    pub stop_key: u16,
    pub cancel_key: u16,
    pub lure_enabled: bool,
    /// 0 means no lure key is bound
    pub lure_key: u16,
    /// Minutes between lure applications
    pub lure_interval: u64,
    /// Bobber search area; `None` uses the default area of the screen
    pub roi: Option<Region>,
    pub screen_index: usize,
    /// Minutes, 0 = unlimited
    pub run_time_limit: u64,
    pub show_detection_point: bool,
    pub logout_after_full_bag: bool,
    pub fish_caught: u64,
    pub throws: u64,
    /// Empty selects the system default input
    pub audio_device: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            splash_threshold: 0.15,
            reaction_time: 350,
            cast_key: None,
            interact_key: SC_F10,
            stop_key: SC_SPACE,
            cancel_key: SC_ESC,
            lure_enabled: false,
            lure_key: 0,
            lure_interval: 10,
            roi: None,
            screen_index: 0,
            run_time_limit: 0,
            show_detection_point: false,
            logout_after_full_bag: false,
            fish_caught: 0,
            throws: 0,
            audio_device: String::new(),
        }
    }
}

impl Settings {
    pub fn cast_key(&self) -> u16 {
        self.cast_key.unwrap_or(self.interact_key)
    }

    pub fn lure_key(&self) -> Option<u16> {
        (self.lure_key != 0).then_some(self.lure_key)
    }

    pub fn audio_device(&self) -> Option<&str> {
        let name = self.audio_device.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Read settings from a JSON file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Settings shared between the configuration surface and the engine
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    /// Store that never touches disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings: RwLock::new(settings),
        }
    }

    /// Load from `path`, falling back to defaults when the file is unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match Settings::load(&path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("[CONFIG] Failed to read {:?}, using defaults: {}", path, e);
                Settings::default()
            }
        };
        Self {
            path: Some(path),
            settings: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Replace the settings and persist them
    pub fn update(&self, settings: Settings) {
        *self.settings.write() = settings;
        self.persist();
    }

    pub fn increment_fish_caught(&self) {
        self.settings.write().fish_caught += 1;
        self.persist();
    }

    pub fn increment_throws(&self) {
        self.settings.write().throws += 1;
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        let snapshot = self.snapshot();
        if let Err(e) = snapshot.save(path) {
            tracing::warn!("[CONFIG] Failed to save {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.splash_threshold, 0.15);
        assert_eq!(s.reaction_time, 350);
        assert_eq!(s.cast_key(), SC_F10);
        assert_eq!(s.lure_key(), None);
        assert_eq!(s.audio_device(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"castKey": 33, "runTimeLimit": 45, "audioDevice": "Mic"}"#)
                .unwrap();
        assert_eq!(s.cast_key(), 33);
        assert_eq!(s.interact_key, SC_F10);
        assert_eq!(s.run_time_limit, 45);
        assert_eq!(s.audio_device(), Some("Mic"));
        assert!(s.roi.is_none());
    }

    #[test]
    fn test_roi_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");
        let mut s = Settings::default();
        s.roi = Some(Region::new(100, 200, 640, 360));
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn test_store_counters_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path);
        store.increment_throws();
        store.increment_throws();
        store.increment_fish_caught();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.throws, 2);
        assert_eq!(reloaded.fish_caught, 1);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::open(&path);
        assert_eq!(store.snapshot(), Settings::default());
    }
}
