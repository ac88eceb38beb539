use crate::events::{CursorPoint, DisplayBounds};
use std::fmt;

/// Порог близости к краю экрана (px), внутри которого угол считается задетым
pub const EDGE_THRESHOLD_PX: i32 = 30;

/// Радиус «рядом с углом», в котором опрос ускоряется
pub const NEAR_CORNER_THRESHOLD_PX: i32 = EDGE_THRESHOLD_PX * 2;

/// Один из четырёх углов экрана
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Corner {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Corner::TopLeft => "Top left corner",
            Corner::TopRight => "Top right corner",
            Corner::BottomLeft => "Bottom left corner",
            Corner::BottomRight => "Bottom right corner",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key.trim())
    }

    /// Предикат угла: точка не дальше EDGE_THRESHOLD_PX от обоих краёв угла
    pub fn contains(&self, point: CursorPoint, bounds: &DisplayBounds) -> bool {
        let left = point.x <= bounds.x + EDGE_THRESHOLD_PX;
        let right = point.x >= bounds.right() - EDGE_THRESHOLD_PX;
        let top = point.y <= bounds.y + EDGE_THRESHOLD_PX;
        let bottom = point.y >= bounds.bottom() - EDGE_THRESHOLD_PX;

        match self {
            Corner::TopLeft => left && top,
            Corner::TopRight => right && top,
            Corner::BottomLeft => left && bottom,
            Corner::BottomRight => right && bottom,
        }
    }

    /// Координаты вершины угла на дисплее
    pub fn target_point(&self, bounds: &DisplayBounds) -> CursorPoint {
        match self {
            Corner::TopLeft => CursorPoint::new(bounds.x, bounds.y),
            Corner::TopRight => CursorPoint::new(bounds.right(), bounds.y),
            Corner::BottomLeft => CursorPoint::new(bounds.x, bounds.bottom()),
            Corner::BottomRight => CursorPoint::new(bounds.right(), bounds.bottom()),
        }
    }

    pub fn is_near(&self, point: CursorPoint, bounds: &DisplayBounds) -> bool {
        let target = self.target_point(bounds);
        let threshold = NEAR_CORNER_THRESHOLD_PX.max(EDGE_THRESHOLD_PX);
        (point.x - target.x).abs() <= threshold && (point.y - target.y).abs() <= threshold
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
