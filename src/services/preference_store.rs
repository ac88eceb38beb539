use crate::config::{Preferences, RawPreferences};
use crate::error::Result;
use figment::providers::{Format, Toml};
use figment::value::Dict;
use figment::Figment;
#[cfg(test)]
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Плоское хранилище пользовательских настроек
pub trait PreferenceStore: Send + Sync {
    /// Прочитать настройки; ошибки и неверные значения дают умолчания
    fn load(&self) -> Preferences;

    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// Настройки в TOML-файле с плоскими camelCase ключами
pub struct TomlPreferenceStore {
    path: PathBuf,
}

impl TomlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn load(&self) -> Preferences {
        if !self.path.exists() {
            debug!("Файл настроек {:?} не найден, используем умолчания", self.path);
            return Preferences::default();
        }

        match Figment::new().merge(Toml::file(&self.path)).extract::<Dict>() {
            Ok(dict) => Preferences::from_raw(RawPreferences::from_dict(&dict)),
            Err(e) => {
                warn!("Не удалось прочитать настройки {:?}: {}; используем умолчания", self.path, e);
                Preferences::default()
            }
        }
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let serialized = toml::to_string(&preferences.to_raw())
            .map_err(|e| crate::corner_error!(internal, "Не удалось сериализовать настройки: {}", e))?;
        std::fs::write(&self.path, serialized)?;

        info!("Настройки сохранены в {:?}", self.path);
        Ok(())
    }
}

/// Хранилище в памяти
#[cfg(test)]
#[derive(Default)]
pub struct MemoryPreferenceStore {
    saved: Mutex<Option<Preferences>>,
}

#[cfg(test)]
impl MemoryPreferenceStore {
    pub fn new(initial: Preferences) -> Self {
        Self {
            saved: Mutex::new(Some(initial)),
        }
    }

    pub fn saved(&self) -> Option<Preferences> {
        self.saved.lock().clone()
    }
}

#[cfg(test)]
impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Preferences {
        self.saved.lock().clone().unwrap_or_default()
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        *self.saved.lock() = Some(preferences.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DisplaySelector;
    use crate::mappings::{Corner, SpeedPreset};

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("absent.toml"));
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn test_save_then_load_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("nested").join("preferences.toml"));

        let prefs = Preferences {
            display: DisplaySelector::Id("HDMI-1".to_string()),
            corner: Corner::BottomLeft,
            speed: SpeedPreset::MEDIUM,
            disable_on_fullscreen: false,
            excluded_programs: vec!["/usr/bin/mpv".to_string()],
        };
        store.save(&prefs).unwrap();

        let written = std::fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("detectionSpeed = \"medium\""));
        assert!(written.contains("corner = \"bottom-left\""));
        assert_eq!(store.load(), prefs);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "corner = [unterminated").unwrap();

        assert_eq!(TomlPreferenceStore::new(path).load(), Preferences::default());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryPreferenceStore::default();
        assert_eq!(store.load(), Preferences::default());
        assert_eq!(store.saved(), None);

        let mut prefs = Preferences::default();
        prefs.corner = Corner::TopRight;
        store.save(&prefs).unwrap();
        assert_eq!(store.load().corner, Corner::TopRight);
    }
}
