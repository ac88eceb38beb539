use crate::events::DisplaySelector;
use crate::mappings::{Corner, KeyCombo, SpeedPreset};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    value::{Dict, Value},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "corner-taskview";
const PREFERENCES_FILE_NAME: &str = "preferences.toml";
const WORKER_SUBCOMMAND: &str = "worker";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub worker: WorkerConfig,
    pub foreground: ForegroundConfig,
    pub display: DisplayConfig,
    pub action: ActionConfig,
    pub preferences: PreferencesConfig,
    /// Файл, из которого загружена конфигурация; передаётся воркеру
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Как запускать воркер и как долго его ждать
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Пусто - запускаем собственный бинарник с подкомандой `worker`
    pub program: Option<String>,
    pub args: Vec<String>,
    pub status_timeout_ms: u64,
    pub action_restart_backoff_ms: u64,
    pub probe_restart_backoff_ms: u64,
    pub exit_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForegroundConfig {
    pub poll_interval_ms: u64,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionConfig {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PreferencesConfig {
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            status_timeout_ms: 1500,
            action_restart_backoff_ms: 250,
            probe_restart_backoff_ms: 500,
            exit_grace_ms: 500,
        }
    }
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 650,
            refresh_interval_ms: 350,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
        }
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            keys: vec!["leftmeta".to_string(), "tab".to_string()],
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CORNER_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;
        config.source = Some(config_path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация таймингов воркера
        if self.worker.status_timeout_ms == 0 {
            anyhow::bail!("status_timeout_ms должно быть больше 0");
        }

        if self.worker.exit_grace_ms == 0 {
            anyhow::bail!("exit_grace_ms должно быть больше 0");
        }

        if self.foreground.poll_interval_ms < 50 {
            anyhow::bail!("foreground.poll_interval_ms должно быть минимум 50");
        }

        if self.display.refresh_interval_ms < 100 {
            anyhow::bail!("display.refresh_interval_ms должно быть минимум 100");
        }

        // Сочетание клавиш должно разбираться целиком
        KeyCombo::parse(&self.action.keys).context("Неверное сочетание в [action] keys")?;

        Ok(())
    }

    /// Программа и аргументы воркера
    pub fn worker_command(&self) -> Result<(PathBuf, Vec<String>)> {
        if let Some(program) = self.worker.program.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok((PathBuf::from(program), self.worker.args.clone()));
        }

        let exe = std::env::current_exe().context("Не удалось определить путь к собственному бинарнику")?;
        let mut args = Vec::new();
        if let Some(source) = &self.source {
            args.push("--config".to_string());
            args.push(source.display().to_string());
        }
        args.push(WORKER_SUBCOMMAND.to_string());
        args.extend(self.worker.args.iter().cloned());
        Ok((exe, args))
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.worker.status_timeout_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.worker.exit_grace_ms)
    }

    pub fn preferences_path(&self) -> PathBuf {
        if let Some(path) = &self.preferences.path {
            return path.clone();
        }

        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(PREFERENCES_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(PREFERENCES_FILE_NAME))
    }
}

/// Пользовательские настройки после нормализации
///
/// Значения вне закрытых перечислений при чтении молча заменяются умолчаниями.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub display: DisplaySelector,
    pub corner: Corner,
    pub speed: SpeedPreset,
    pub disable_on_fullscreen: bool,
    pub excluded_programs: Vec<String>,
}

/// Плоский ключ-значение контракт хранилища настроек
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_on_fullscreen: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_programs: Option<Vec<String>>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display: DisplaySelector::Primary,
            corner: Corner::TopLeft,
            speed: SpeedPreset::FAST,
            disable_on_fullscreen: true,
            excluded_programs: Vec::new(),
        }
    }
}

impl RawPreferences {
    /// Поключевое чтение: значение неверного типа не ломает остальные ключи
    pub fn from_dict(dict: &Dict) -> Self {
        let display_id = dict.get("displayId").and_then(|v| match v {
            Value::String(_, s) => Some(s.clone()),
            other => other.to_i128().map(|n| n.to_string()),
        });

        let excluded_programs = dict.get("excludedPrograms").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        });

        Self {
            display_id,
            corner: dict.get("corner").and_then(Value::as_str).map(str::to_string),
            detection_speed: dict.get("detectionSpeed").and_then(Value::as_str).map(str::to_string),
            disable_on_fullscreen: dict.get("disableOnFullscreen").and_then(Value::to_bool),
            excluded_programs,
        }
    }
}

impl Preferences {
    pub fn from_raw(raw: RawPreferences) -> Self {
        let defaults = Self::default();

        Self {
            display: raw
                .display_id
                .as_deref()
                .map(DisplaySelector::parse)
                .unwrap_or(defaults.display),
            corner: raw
                .corner
                .as_deref()
                .and_then(Corner::from_key)
                .unwrap_or(defaults.corner),
            speed: raw
                .detection_speed
                .as_deref()
                .and_then(SpeedPreset::from_key)
                .unwrap_or(defaults.speed),
            disable_on_fullscreen: raw.disable_on_fullscreen.unwrap_or(defaults.disable_on_fullscreen),
            excluded_programs: raw
                .excluded_programs
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn to_raw(&self) -> RawPreferences {
        RawPreferences {
            display_id: Some(self.display.as_key().to_string()),
            corner: Some(self.corner.key().to_string()),
            detection_speed: Some(self.speed.key.to_string()),
            disable_on_fullscreen: Some(self.disable_on_fullscreen),
            excluded_programs: Some(self.excluded_programs.clone()),
        }
    }

    /// Окно переднего плана нужно опрашивать только если есть что подавлять
    pub fn should_monitor_foreground(&self) -> bool {
        self.disable_on_fullscreen || !self.excluded_programs.is_empty()
    }

    /// Добавить исключение без дублей (сравнение регистронезависимое)
    pub fn add_exclusion(&mut self, exe: &str) -> bool {
        let exe = exe.trim();
        if exe.is_empty() {
            return false;
        }
        let lower = exe.to_lowercase();
        if self.excluded_programs.iter().any(|e| e.to_lowercase() == lower) {
            return false;
        }
        self.excluded_programs.push(exe.to_string());
        true
    }

    pub fn remove_exclusion(&mut self, index: usize) -> Option<String> {
        (index < self.excluded_programs.len()).then(|| self.excluded_programs.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn dict_from_toml(source: &str) -> Dict {
        Figment::new().merge(Toml::string(source)).extract().unwrap()
    }

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_action_key_rejected() {
        let mut config = Config::default();
        config.action.keys = vec!["leftmeta".to_string(), "hyper".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("[worker]\nstatus_timeout_ms = 900\n"))
            .extract()
            .unwrap();

        assert_eq!(config.worker.status_timeout_ms, 900);
        assert_eq!(config.worker.action_restart_backoff_ms, 250);
        assert_eq!(config.foreground.poll_interval_ms, 650);
    }

    #[test]
    fn test_explicit_worker_program_is_used_verbatim() {
        let mut config = Config::default();
        config.worker.program = Some("/usr/local/bin/corner-helper".to_string());
        config.worker.args = vec!["--quiet".to_string()];

        let (program, args) = config.worker_command().unwrap();
        assert_eq!(program, PathBuf::from("/usr/local/bin/corner-helper"));
        assert_eq!(args, vec!["--quiet".to_string()]);
    }

    #[test]
    fn test_own_binary_worker_gets_config_path() {
        let mut config = Config::default();
        config.source = Some(PathBuf::from("/etc/corner.toml"));

        let (_, args) = config.worker_command().unwrap();
        assert_eq!(args, vec!["--config", "/etc/corner.toml", "worker"]);
    }

    #[test]
    fn test_preferences_defaults_when_absent() {
        let prefs = Preferences::from_raw(RawPreferences::from_dict(&Dict::new()));
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.should_monitor_foreground());
    }

    #[test]
    fn test_invalid_enumerations_fall_back_silently() {
        let dict = dict_from_toml(
            r#"
            displayId = 42
            corner = "center"
            detectionSpeed = "warp"
            disableOnFullscreen = "yes please"
            excludedPrograms = ["game.exe", 7, "  "]
            "#,
        );
        let prefs = Preferences::from_raw(RawPreferences::from_dict(&dict));

        assert_eq!(prefs.display, DisplaySelector::Id("42".to_string()));
        assert_eq!(prefs.corner, Corner::TopLeft);
        assert_eq!(prefs.speed, SpeedPreset::FAST);
        assert!(prefs.disable_on_fullscreen);
        assert_eq!(prefs.excluded_programs, vec!["game.exe".to_string()]);
    }

    #[test]
    fn test_valid_preferences_are_read() {
        let dict = dict_from_toml(
            r#"
            displayId = "HDMI-1"
            corner = "bottom-right"
            detectionSpeed = "slow"
            disableOnFullscreen = false
            "#,
        );
        let prefs = Preferences::from_raw(RawPreferences::from_dict(&dict));

        assert_eq!(prefs.display, DisplaySelector::Id("HDMI-1".to_string()));
        assert_eq!(prefs.corner, Corner::BottomRight);
        assert_eq!(prefs.speed, SpeedPreset::SLOW);
        assert!(!prefs.should_monitor_foreground());
    }

    #[test]
    fn test_exclusions_deduplicate_case_insensitively() {
        let mut prefs = Preferences::default();
        assert!(prefs.add_exclusion("C:\\Games\\Game.exe"));
        assert!(!prefs.add_exclusion("c:\\games\\game.EXE"));
        assert!(!prefs.add_exclusion("   "));
        assert_eq!(prefs.remove_exclusion(3), None);
        assert_eq!(prefs.remove_exclusion(0).as_deref(), Some("C:\\Games\\Game.exe"));
    }
}
