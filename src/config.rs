//! Persisted user settings.
//!
//! Stored as JSON under `~/Library/Application Support/Orbit/config.json`.
//! A missing file yields defaults; a malformed one yields defaults and a warning.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use home::home_dir;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::trigger::TriggerModifier;

pub const MIN_LONG_PRESS_MS: u64 = 100;
pub const MAX_LONG_PRESS_MS: u64 = 300;
const LONG_PRESS_STEP_MS: u64 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl CardSize {
    pub fn points(self) -> f32 {
        match self {
            CardSize::Small => 64.0,
            CardSize::Medium => 80.0,
            CardSize::Large => 96.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardMaterial {
    UltraThin,
    Thin,
    #[default]
    Regular,
    Thick,
}

impl CardMaterial {
    /// Background opacity of a card.
    pub fn fill_alpha(self) -> u8 {
        match self {
            CardMaterial::UltraThin => 90,
            CardMaterial::Thin => 140,
            CardMaterial::Regular => 190,
            CardMaterial::Thick => 235,
        }
    }
}

/// What releasing a card inside the target does to its application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropAction {
    #[default]
    Terminate,
    Activate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub trigger_modifier: TriggerModifier,
    pub long_press_threshold_ms: u64,
    pub card_size: CardSize,
    pub card_material: CardMaterial,
    pub drop_action: DropAction,
    pub terminate_grace_period_ms: u64,
    pub dissolve_duration_ms: u64,
    pub dissolve_particle_count: usize,
    pub near_target_radius: f32,
    pub file_hover_timeout_ms: u64,
    pub has_seen_welcome: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trigger_modifier: TriggerModifier::Option,
            long_press_threshold_ms: 180,
            card_size: CardSize::Medium,
            card_material: CardMaterial::Regular,
            drop_action: DropAction::Terminate,
            terminate_grace_period_ms: 3000,
            dissolve_duration_ms: 800,
            dissolve_particle_count: 60,
            near_target_radius: 90.0,
            file_hover_timeout_ms: 1000,
            has_seen_welcome: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings.normalized())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Clamp the long-press threshold into range and snap it to 10ms steps.
    pub fn normalized(mut self) -> Self {
        let ms = self
            .long_press_threshold_ms
            .clamp(MIN_LONG_PRESS_MS, MAX_LONG_PRESS_MS);
        self.long_press_threshold_ms =
            (ms + LONG_PRESS_STEP_MS / 2) / LONG_PRESS_STEP_MS * LONG_PRESS_STEP_MS;
        self.near_target_radius = self.near_target_radius.max(1.0);
        self
    }

    pub fn long_press_threshold(&self) -> Duration {
        Duration::from_millis(self.long_press_threshold_ms)
    }

    pub fn terminate_grace_period(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_period_ms)
    }

    pub fn dissolve_duration(&self) -> Duration {
        Duration::from_millis(self.dissolve_duration_ms)
    }

    pub fn file_hover_timeout(&self) -> Duration {
        Duration::from_millis(self.file_hover_timeout_ms)
    }
}

/// Settings bound to their file, reloaded when the file changes.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    modified: Option<SystemTime>,
    settings: Settings,
}

impl ConfigStore {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home
            .join("Library")
            .join("Application Support")
            .join("Orbit")
            .join("config.json"))
    }

    pub fn open(path: PathBuf) -> Self {
        let mut store = Self {
            path,
            modified: None,
            settings: Settings::default(),
        };
        store.reload();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-read the file if its modification time moved. Returns whether settings changed.
    pub fn reload_if_changed(&mut self) -> bool {
        let modified = modified_time(&self.path);
        if modified == self.modified {
            return false;
        }
        let before = self.settings.clone();
        self.reload();
        before != self.settings
    }

    pub fn update(&mut self, settings: Settings) -> Result<(), ConfigError> {
        let settings = settings.normalized();
        settings.save(&self.path)?;
        self.settings = settings;
        self.modified = modified_time(&self.path);
        Ok(())
    }

    fn reload(&mut self) {
        self.modified = modified_time(&self.path);
        self.settings = match Settings::load(&self.path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load {:?}, using defaults: {}", self.path, e);
                Settings::default()
            }
        };
        debug!(?self.settings, "settings loaded");
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"triggerModifier":"command","dropAction":"activate"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.trigger_modifier, TriggerModifier::Command);
        assert_eq!(settings.drop_action, DropAction::Activate);
        assert_eq!(settings.long_press_threshold_ms, 180);
    }

    #[test]
    fn threshold_is_clamped_and_snapped() {
        let mut settings = Settings {
            long_press_threshold_ms: 20,
            ..Settings::default()
        };
        assert_eq!(settings.clone().normalized().long_press_threshold_ms, 100);

        settings.long_press_threshold_ms = 999;
        assert_eq!(settings.clone().normalized().long_press_threshold_ms, 300);

        settings.long_press_threshold_ms = 184;
        assert_eq!(settings.clone().normalized().long_press_threshold_ms, 180);

        settings.long_press_threshold_ms = 186;
        assert_eq!(settings.normalized().long_press_threshold_ms, 190);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(path);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn update_persists_and_reload_sees_external_edit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut store = ConfigStore::open(path.clone());

        let settings = Settings {
            card_size: CardSize::Large,
            ..Settings::default()
        };
        store.update(settings).unwrap();
        assert!(!store.reload_if_changed());
        assert_eq!(Settings::load(&path).unwrap().card_size, CardSize::Large);

        fs::write(&path, r#"{"cardSize":"small"}"#).unwrap();
        // force a distinct mtime on coarse filesystems
        store.modified = None;
        assert!(store.reload_if_changed());
        assert_eq!(store.settings().card_size, CardSize::Small);
    }
}
