use serde::{Deserialize, Serialize};
use std::fmt;

/// Позиция курсора в экранных координатах
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPoint {
    pub x: i32,
    pub y: i32,
}

impl CursorPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for CursorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Прямоугольник дисплея
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Границы включительно с обеих сторон: точка на правом/нижнем краю тоже внутри
    pub fn contains(&self, point: CursorPoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

impl fmt::Display for DisplayBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Описание одного монитора, полученное от оконной системы
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: String,
    pub label: String,
    pub bounds: DisplayBounds,
    pub primary: bool,
}

/// Какой дисплей отслеживать: основной или конкретный по идентификатору
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DisplaySelector {
    #[default]
    Primary,
    Id(String),
}

impl DisplaySelector {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("primary") {
            Self::Primary
        } else {
            Self::Id(trimmed.to_string())
        }
    }

    pub fn as_key(&self) -> &str {
        match self {
            Self::Primary => "primary",
            Self::Id(id) => id,
        }
    }

    /// Разрешить целевой дисплей; несуществующий id откатывается на основной
    pub fn resolve<'a>(&self, displays: &'a [DisplayInfo]) -> Option<&'a DisplayInfo> {
        let primary = || displays.iter().find(|d| d.primary).or_else(|| displays.first());
        match self {
            Self::Primary => primary(),
            Self::Id(id) => displays.iter().find(|d| &d.id == id).or_else(primary),
        }
    }
}

impl fmt::Display for DisplaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}
