use crate::config::Preferences;
use crate::events::{DisplaySelector, ForegroundInfo};
use crate::mappings::{Corner, SpeedPreset};
use std::fmt;

/// Команды для движка; UI (трей, CLI) не трогает состояние напрямую
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    SetCorner(Corner),
    SetDisplay(DisplaySelector),
    SetSpeed(SpeedPreset),
    ToggleFullscreenSuppression,
    SetFullscreenSuppression(bool),
    AddExclusion(String),
    /// Добавить в исключения программу, которая сейчас в фокусе
    ExcludeFocusedProgram,
    RemoveExclusion(usize),
    ClearExclusions,
    Shutdown,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::SetCorner(corner) => write!(f, "SetCorner({})", corner),
            EngineCommand::SetDisplay(display) => write!(f, "SetDisplay({})", display),
            EngineCommand::SetSpeed(speed) => write!(f, "SetSpeed({})", speed.key),
            EngineCommand::ToggleFullscreenSuppression => f.write_str("ToggleFullscreenSuppression"),
            EngineCommand::SetFullscreenSuppression(v) => write!(f, "SetFullscreenSuppression({})", v),
            EngineCommand::AddExclusion(exe) => write!(f, "AddExclusion({})", exe),
            EngineCommand::ExcludeFocusedProgram => f.write_str("ExcludeFocusedProgram"),
            EngineCommand::RemoveExclusion(idx) => write!(f, "RemoveExclusion({})", idx),
            EngineCommand::ClearExclusions => f.write_str("ClearExclusions"),
            EngineCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Уведомления от движка для перерисовки UI
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    ConfigurationChanged(Preferences),
    DisplaysChanged(usize),
    Triggered { corner: Corner },
    ForegroundChanged(ForegroundInfo),
}
