use crate::config::Preferences;
use crate::events::ForegroundInfo;
use tokio::time::Duration;

/// Окно после срабатывания, в течение которого полноэкранное окно оболочки
/// считается нашим же экраном переключения задач
pub const TRIGGER_RECENCY_WINDOW: Duration = Duration::from_secs(5);

/// Процессы оболочки, которые рисуют экран переключения задач
const SHELL_PROCESSES: &[&str] = &[
    "explorer.exe",
    "explorer",
    "gnome-shell",
    "kwin_x11",
    "kwin_wayland",
    "kwin",
    "plasmashell",
    "cinnamon",
    "muffin",
    "xfwm4",
];

/// Классы окон экранов переключения (подстроки, без учёта регистра)
const SWITCHER_SURFACE_CLASSES: &[&str] = &[
    "xamlexplorerhostislandwindow",
    "multitaskingviewframe",
    "windows.ui.core.corewindow",
    "gnome-shell",
    "plasmashell",
    "kwin",
];

/// Заголовки экрана представления задач на разных языках
const SWITCHER_SURFACE_TITLES: &[&str] = &[
    "task view",
    "aufgabenansicht",
    "vue des tâches",
    "vista de tareas",
    "visualizzazione attività",
    "visão de tarefas",
    "представление задач",
    "activities",
    "overview",
    "present windows",
];

/// Общий маркер окна-переключателя, независимо от процесса-владельца
const GENERIC_SWITCHER_CLASSES: &[&str] = &["taskswitcherwnd", "taskswitcher", "alt-tab"];

/// Класс снимка окна переднего плана
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundClass {
    Normal,
    /// Экран переключения задач, открытый нашим собственным действием
    TaskViewLike,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    if haystack.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Окно принадлежит процессу оболочки (по exe или имени процесса)
pub fn is_shell_owned(info: &ForegroundInfo) -> bool {
    let basename = info.exe_basename().to_lowercase();
    let process = info.process_name.to_lowercase();
    SHELL_PROCESSES
        .iter()
        .any(|shell| basename == *shell || process == *shell)
}

/// Чистая классификация снимка; `since_last_trigger` - сколько прошло с последнего срабатывания
///
/// Эвристики объединяются: хватает любой из них.
pub fn classify(info: &ForegroundInfo, since_last_trigger: Option<Duration>) -> ForegroundClass {
    if info.is_task_view_like {
        return ForegroundClass::TaskViewLike;
    }

    let shell_owned = is_shell_owned(info);
    if shell_owned
        && (contains_any(&info.class_name, SWITCHER_SURFACE_CLASSES)
            || contains_any(&info.title, SWITCHER_SURFACE_TITLES))
    {
        return ForegroundClass::TaskViewLike;
    }

    if contains_any(&info.class_name, GENERIC_SWITCHER_CLASSES) {
        return ForegroundClass::TaskViewLike;
    }

    let recently_triggered = since_last_trigger
        .map(|elapsed| elapsed < TRIGGER_RECENCY_WINDOW)
        .unwrap_or(false);
    if recently_triggered && info.is_real_fullscreen && shell_owned {
        return ForegroundClass::TaskViewLike;
    }

    ForegroundClass::Normal
}

/// Программа попадает в список исключений (полный путь или имя файла, без учёта регистра)
pub fn is_excluded(info: &ForegroundInfo, excluded_programs: &[String]) -> bool {
    if info.exe.is_empty() {
        return false;
    }
    let exe = info.exe.to_lowercase();
    let basename = info.exe_basename().to_lowercase();
    excluded_programs.iter().any(|entry| {
        let normalized = entry.trim().to_lowercase();
        !normalized.is_empty() && (normalized == exe || normalized == basename)
    })
}

/// Решение политики подавления для одного снимка
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuppressionDecision {
    pub suppressed: bool,
    pub task_view_like: bool,
    pub excluded: bool,
}

impl SuppressionDecision {
    /// Ничего не известно об окне - не подавляем
    pub const NONE: Self = Self {
        suppressed: false,
        task_view_like: false,
        excluded: false,
    };
}

pub struct SuppressionPolicy;

impl SuppressionPolicy {
    pub fn evaluate(
        info: Option<&ForegroundInfo>,
        preferences: &Preferences,
        since_last_trigger: Option<Duration>,
    ) -> SuppressionDecision {
        if !preferences.should_monitor_foreground() {
            return SuppressionDecision::NONE;
        }
        let Some(info) = info else {
            return SuppressionDecision::NONE;
        };

        let task_view_like = classify(info, since_last_trigger) == ForegroundClass::TaskViewLike;
        let excluded = is_excluded(info, &preferences.excluded_programs);
        let fullscreen = preferences.disable_on_fullscreen && info.is_real_fullscreen && !task_view_like;

        SuppressionDecision {
            suppressed: excluded || fullscreen,
            task_view_like,
            excluded,
        }
    }
}
