use crate::error::Result;
use crate::events::{CursorPoint, DisplayInfo};
use std::sync::Arc;

/// Trait for the host windowing collaborator
#[async_trait::async_trait]
pub trait DisplayService: Send + Sync {
    /// Текущая позиция курсора в экранных координатах
    async fn cursor_position(&self) -> Result<CursorPoint>;

    /// Все подключённые мониторы
    async fn displays(&self) -> Result<Vec<DisplayInfo>>;
}

/// Factory function to create an appropriate display service based on the dry_run flag
pub fn create_display_service(dry_run: bool) -> Result<Arc<dyn DisplayService>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunDisplayService::new()))
    } else {
        Ok(Arc::new(super::x11::X11DisplayService::new()?))
    }
}
