use crate::config::Config;
use crate::error::Result;
use crate::events::ForegroundInfo;
use std::sync::Arc;

/// Capability interface between the engine and the OS.
///
/// The engine only ever fires the action and asks what is in the foreground;
/// how that happens (worker subprocess, native binding, in-memory fake) is up
/// to the implementation.
#[async_trait::async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Поднять долгоживущие ресурсы (воркер действия)
    fn start(&self);

    /// Выполнить действие; ошибки поглощаются реализацией
    fn perform_action(&self);

    /// Снимок окна переднего плана; при неудаче - пустой `ForegroundInfo`
    async fn probe_foreground(&self) -> ForegroundInfo;

    /// Включить/выключить фоновый мониторинг окна переднего плана
    async fn set_foreground_monitoring(&self, enabled: bool);

    /// Корректно освободить все ресурсы; повторный вызов безопасен
    async fn shutdown(&self);
}

/// Factory function to create an appropriate bridge based on the dry_run flag
pub fn create_platform_bridge(config: &Config, dry_run: bool) -> Result<Arc<dyn PlatformBridge>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunBridge::new()))
    } else {
        Ok(Arc::new(super::worker_bridge::WorkerBridge::new(config)?))
    }
}
