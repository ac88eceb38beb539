use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Снимок активного окна, как его описывает воркер в ответ на STATUS
///
/// Пустой объект `{}` разбирается в значение по умолчанию: неизвестное окно,
/// без полноэкранного режима.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForegroundInfo {
    pub exe: String,
    pub title: String,
    pub class_name: String,
    pub process_name: String,
    pub is_fullscreen: bool,
    pub is_real_fullscreen: bool,
    pub is_maximized: bool,
    pub is_borderless: bool,
    pub is_task_view_like: bool,
}

impl ForegroundInfo {
    /// Разобрать строку ответа воркера; любой мусор превращается в пустой снимок
    pub fn from_status_line(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        serde_json::from_str(trimmed).unwrap_or_default()
    }

    pub fn to_status_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Имя исполняемого файла без пути (понимает и `\`, и `/`)
    pub fn exe_basename(&self) -> &str {
        exe_basename(&self.exe)
    }
}

pub fn exe_basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

impl fmt::Display for ForegroundInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<unknown>");
        }
        write!(f, "\"{}\" [{}] {}", self.title, self.class_name, self.exe_basename())?;
        if self.is_real_fullscreen {
            f.write_str(" (fullscreen)")?;
        } else if self.is_maximized {
            f.write_str(" (maximized)")?;
        }
        Ok(())
    }
}

/// Стилевые признаки окна, из которых выводится «настоящий» полноэкранный режим
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowTraits {
    pub covers_monitor: bool,
    pub borderless: bool,
    pub popup: bool,
    pub overlapped: bool,
    pub maximized: bool,
}

impl WindowTraits {
    /// Окно закрывает монитор и при этом эксклюзивно по стилю, а не просто развёрнуто
    pub fn is_real_fullscreen(&self) -> bool {
        self.covers_monitor
            && (self.borderless || self.popup || !self.overlapped)
            && !self.maximized
    }
}

/// Снимок вместе с моментом и порядковым номером запроса, который его получил
#[derive(Debug, Clone)]
pub struct ForegroundSnapshot {
    pub info: ForegroundInfo,
    pub observed_at: Instant,
    pub sequence: u64,
}
