use super::r#trait::PlatformBridge;
use crate::events::ForegroundInfo;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Мост без побочных эффектов: действие только логируется, окно - по сценарию
pub struct DryRunBridge {
    triggers: AtomicU64,
    monitoring: AtomicBool,
    scripted: Mutex<Vec<ForegroundInfo>>,
    cursor: AtomicU64,
}

impl DryRunBridge {
    pub fn new() -> Self {
        let fake_windows = vec![
            ForegroundInfo {
                exe: "/usr/bin/alacritty".to_string(),
                title: "Terminal - dry_run".to_string(),
                class_name: "Alacritty".to_string(),
                process_name: "alacritty".to_string(),
                ..Default::default()
            },
            ForegroundInfo {
                exe: "/usr/bin/mpv".to_string(),
                title: "Video - dry_run".to_string(),
                class_name: "mpv".to_string(),
                process_name: "mpv".to_string(),
                is_fullscreen: true,
                is_real_fullscreen: true,
                is_borderless: true,
                ..Default::default()
            },
        ];
        Self::with_script(fake_windows)
    }

    /// Снимки отдаются по кругу, по одному на каждый опрос
    pub fn with_script(windows: Vec<ForegroundInfo>) -> Self {
        Self {
            triggers: AtomicU64::new(0),
            monitoring: AtomicBool::new(false),
            scripted: Mutex::new(windows),
            cursor: AtomicU64::new(0),
        }
    }

    pub fn trigger_count(&self) -> u64 {
        self.triggers.load(Ordering::SeqCst)
    }
}

impl Default for DryRunBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PlatformBridge for DryRunBridge {
    fn start(&self) {
        info!("[DRY RUN] Мост платформы в режиме эмуляции, воркер не запускается");
    }

    fn perform_action(&self) {
        let n = self.triggers.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[DRY RUN] Действие угла #{} (сочетание клавиш не нажимается)", n);
    }

    async fn probe_foreground(&self) -> ForegroundInfo {
        let scripted = self.scripted.lock();
        if scripted.is_empty() {
            return ForegroundInfo::default();
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) as usize % scripted.len();
        scripted[index].clone()
    }

    async fn set_foreground_monitoring(&self, enabled: bool) {
        if self.monitoring.swap(enabled, Ordering::SeqCst) != enabled {
            info!("[DRY RUN] Мониторинг окна переднего плана: {}", enabled);
        }
    }

    async fn shutdown(&self) {
        info!("[DRY RUN] Остановка моста платформы");
    }
}
