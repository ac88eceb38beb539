use super::r#trait::DisplayService;
use crate::error::Result;
use crate::events::{CursorPoint, DisplayBounds, DisplayInfo};
use tokio::time::{Duration, Instant};

const CYCLE: Duration = Duration::from_secs(10);
const IN_CORNER: Duration = Duration::from_secs(2);

/// Один монитор 1920x1080; курсор раз в 10 секунд на 2 секунды заходит в левый верхний угол
pub struct DryRunDisplayService {
    started: Instant,
}

impl DryRunDisplayService {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    fn point_at(elapsed: Duration) -> CursorPoint {
        let phase = Duration::from_millis((elapsed.as_millis() % CYCLE.as_millis()) as u64);
        if phase >= CYCLE - IN_CORNER {
            CursorPoint::new(2, 2)
        } else {
            // Медленный дрейф по центру экрана
            let step = (phase.as_millis() / 500) as i32;
            CursorPoint::new(800 + step * 10, 500)
        }
    }
}

impl Default for DryRunDisplayService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DisplayService for DryRunDisplayService {
    async fn cursor_position(&self) -> Result<CursorPoint> {
        Ok(Self::point_at(self.started.elapsed()))
    }

    async fn displays(&self) -> Result<Vec<DisplayInfo>> {
        Ok(vec![DisplayInfo {
            id: "dry-run-0".to_string(),
            label: "Dry run 1920x1080".to_string(),
            bounds: DisplayBounds::new(0, 0, 1920, 1080),
            primary: true,
        }])
    }
}
