use crate::corner_error;
use crate::error::Result;
use crate::events::{DisplayBounds, ForegroundInfo, WindowTraits};
use crate::services::display::parse_list_monitors;
use crate::services::suppression::{classify, ForegroundClass};
use tokio::process::Command;
use tracing::debug;

/// Что X11 сообщает об окне, кроме имени и класса
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowProperties {
    pub fullscreen_state: bool,
    pub maximized_vert: bool,
    pub maximized_horz: bool,
    /// `_MOTIF_WM_HINTS` запрещает декорации
    pub undecorated: bool,
    /// `_NET_WM_WINDOW_TYPE_NORMAL` или тип не задан
    pub normal_type: bool,
}

/// Описание окна переднего плана через xdotool/xprop/xrandr и /proc
pub struct WindowInspector {
    dry_run: bool,
}

impl WindowInspector {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub async fn inspect(&self) -> Result<ForegroundInfo> {
        if self.dry_run {
            return Ok(ForegroundInfo {
                exe: "/usr/bin/dry-run".to_string(),
                title: "Dry run window".to_string(),
                class_name: "DryRun".to_string(),
                process_name: "dry-run".to_string(),
                ..Default::default()
            });
        }

        let window = run("xdotool", &["getactivewindow"]).await?;
        let window = window.trim().to_string();
        if window.is_empty() {
            return Err(corner_error!(display, "xdotool не вернул активное окно"));
        }
        debug!("Активное окно: {}", window);

        let title = run("xdotool", &["getwindowname", &window]).await.unwrap_or_default();
        let class_name = run("xdotool", &["getwindowclassname", &window]).await.unwrap_or_default();

        let (exe, process_name) = match run("xdotool", &["getwindowpid", &window]).await {
            Ok(pid) => process_identity(pid.trim()),
            Err(e) => {
                debug!("PID окна недоступен: {}", e);
                (String::new(), String::new())
            }
        };

        let geometry = run("xdotool", &["getwindowgeometry", "--shell", &window])
            .await
            .ok()
            .and_then(|out| parse_window_geometry(&out));
        let properties = run(
            "xprop",
            &["-id", &window, "_NET_WM_STATE", "_MOTIF_WM_HINTS", "_NET_WM_WINDOW_TYPE"],
        )
        .await
        .map(|out| parse_xprop(&out))
        .unwrap_or_default();
        let monitors = run("xrandr", &["--listmonitors"])
            .await
            .map(|out| parse_list_monitors(&out))
            .unwrap_or_default();

        let covers_monitor = geometry
            .map(|g| monitors.iter().any(|m| covers(&g, &m.bounds)))
            .unwrap_or(false)
            || properties.fullscreen_state;

        let traits = WindowTraits {
            covers_monitor,
            borderless: properties.undecorated,
            popup: properties.fullscreen_state,
            overlapped: properties.normal_type && !properties.undecorated,
            maximized: properties.maximized_vert && properties.maximized_horz,
        };

        let mut info = ForegroundInfo {
            exe,
            title: title.trim().to_string(),
            class_name: class_name.trim().to_string(),
            process_name,
            is_fullscreen: covers_monitor,
            is_real_fullscreen: traits.is_real_fullscreen(),
            is_maximized: traits.maximized,
            is_borderless: traits.borderless,
            is_task_view_like: false,
        };
        info.is_task_view_like = classify(&info, None) == ForegroundClass::TaskViewLike;

        Ok(info)
    }
}

async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| corner_error!(display, "{} не найден: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(corner_error!(display, "{} вернул ошибку: {}", program, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Путь к исполняемому файлу и имя процесса из /proc
fn process_identity(pid: &str) -> (String, String) {
    if pid.is_empty() || !pid.chars().all(|c| c.is_ascii_digit()) {
        return (String::new(), String::new());
    }

    let exe = std::fs::read_link(format!("/proc/{}/exe", pid))
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let comm = std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    (exe, comm)
}

/// `WINDOW=..\nX=0\nY=0\nWIDTH=1920\nHEIGHT=1080\nSCREEN=0`
pub fn parse_window_geometry(output: &str) -> Option<DisplayBounds> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key {
            "X" => x = value.parse().ok(),
            "Y" => y = value.parse().ok(),
            "WIDTH" => width = value.parse().ok(),
            "HEIGHT" => height = value.parse().ok(),
            _ => {}
        }
    }

    Some(DisplayBounds::new(x?, y?, width?, height?))
}

pub fn parse_xprop(output: &str) -> WindowProperties {
    let mut properties = WindowProperties {
        normal_type: true,
        ..Default::default()
    };

    for line in output.lines() {
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();

        if name.starts_with("_NET_WM_STATE(") {
            properties.fullscreen_state = value.contains("_NET_WM_STATE_FULLSCREEN");
            properties.maximized_vert = value.contains("_NET_WM_STATE_MAXIMIZED_VERT");
            properties.maximized_horz = value.contains("_NET_WM_STATE_MAXIMIZED_HORZ");
        } else if name.starts_with("_MOTIF_WM_HINTS(") {
            properties.undecorated = motif_undecorated(value);
        } else if name.starts_with("_NET_WM_WINDOW_TYPE(") {
            properties.normal_type = value.contains("_NET_WM_WINDOW_TYPE_NORMAL");
        }
    }

    properties
}

/// flags, functions, decorations, ...: бит 0x2 во flags означает, что поле decorations задано
fn motif_undecorated(value: &str) -> bool {
    let fields: Vec<u64> = value
        .split(',')
        .filter_map(|field| {
            let field = field.trim();
            match field.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => field.parse().ok(),
            }
        })
        .collect();

    match fields.as_slice() {
        [flags, _functions, decorations, ..] => flags & 0x2 != 0 && *decorations == 0,
        _ => false,
    }
}

/// Окно закрывает монитор целиком
pub fn covers(window: &DisplayBounds, monitor: &DisplayBounds) -> bool {
    window.x <= monitor.x
        && window.y <= monitor.y
        && window.right() >= monitor.right()
        && window.bottom() >= monitor.bottom()
}
