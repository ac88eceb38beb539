use super::r#trait::DisplayService;
use crate::corner_error;
use crate::error::Result;
use crate::events::{CursorPoint, DisplayBounds, DisplayInfo};
use tokio::process::Command;
use tracing::{debug, info};

/// Геометрия X11 через `xdotool` и `xrandr`
pub struct X11DisplayService;

impl X11DisplayService {
    pub fn new() -> Result<Self> {
        if std::env::var_os("DISPLAY").is_none() {
            return Err(corner_error!(
                service_unavailable,
                "Переменная DISPLAY не задана: X11 недоступен"
            ));
        }
        info!("Источник геометрии: xdotool + xrandr");
        Ok(Self)
    }

    async fn run(program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program).args(args).output().await.map_err(|e| {
            debug!("{} не найден или не работает: {}", program, e);
            corner_error!(display, "{} не найден: {}", program, e)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(corner_error!(display, "{} вернул ошибку: {}", program, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl DisplayService for X11DisplayService {
    async fn cursor_position(&self) -> Result<CursorPoint> {
        let output = Self::run("xdotool", &["getmouselocation", "--shell"]).await?;
        parse_mouse_location(&output)
            .ok_or_else(|| corner_error!(display, "Не удалось разобрать вывод getmouselocation: {:?}", output))
    }

    async fn displays(&self) -> Result<Vec<DisplayInfo>> {
        let output = Self::run("xrandr", &["--listmonitors"]).await?;
        let displays = parse_list_monitors(&output);
        if displays.is_empty() {
            return Err(corner_error!(display, "xrandr не вернул ни одного монитора"));
        }
        Ok(displays)
    }
}

/// `X=123\nY=456\nSCREEN=0\nWINDOW=...`
pub fn parse_mouse_location(output: &str) -> Option<CursorPoint> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        match line.trim().split_once('=') {
            Some(("X", value)) => x = value.trim().parse().ok(),
            Some(("Y", value)) => y = value.trim().parse().ok(),
            _ => {}
        }
    }
    Some(CursorPoint::new(x?, y?))
}

/// Строки вида ` 0: +*eDP-1 1920/344x1080/194+0+0  eDP-1`
pub fn parse_list_monitors(output: &str) -> Vec<DisplayInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let index = parts.next()?.strip_suffix(':')?;
            index.parse::<u32>().ok()?;
            let name = parts.next()?;
            let bounds = parse_monitor_geometry(parts.next()?)?;

            let primary = name.contains('*');
            let id = name.trim_start_matches(['+', '*']).to_string();
            Some(DisplayInfo {
                label: format!("{} ({}x{})", id, bounds.width, bounds.height),
                id,
                bounds,
                primary,
            })
        })
        .collect()
}

/// `1920/344x1080/194+0+0`: ширина/мм x высота/мм +X +Y
pub fn parse_monitor_geometry(geometry: &str) -> Option<DisplayBounds> {
    let (width_part, rest) = geometry.split_once('x')?;
    let width = width_part.split('/').next()?.parse().ok()?;

    let offsets_at = rest.find(['+', '-'])?;
    let height = rest[..offsets_at].split('/').next()?.parse().ok()?;

    let offsets = &rest[offsets_at..];
    let second = offsets[1..].find(['+', '-'])? + 1;
    let x = offsets[..second].parse().ok()?;
    let y = offsets[second..].parse().ok()?;

    Some(DisplayBounds::new(x, y, width, height))
}
