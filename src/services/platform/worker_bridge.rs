use super::r#trait::PlatformBridge;
use crate::config::Config;
use crate::error::Result;
use crate::events::ForegroundInfo;
use crate::services::worker::{ChannelSettings, WorkerChannel, WorkerCommand};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Мост к воркер-подпроцессу: отдельные каналы для действия и для опроса окна
///
/// Медленный STATUS не должен задерживать TRIGGER, поэтому у каждого назначения
/// свой процесс.
pub struct WorkerBridge {
    action: WorkerChannel,
    probe: WorkerChannel,
}

impl WorkerBridge {
    pub fn new(config: &Config) -> Result<Self> {
        let (program, args) = config.worker_command()?;

        let action_settings = ChannelSettings {
            response_timeout: config.status_timeout(),
            restart_backoff: Duration::from_millis(config.worker.action_restart_backoff_ms),
            exit_grace: config.exit_grace(),
        };
        let probe_settings = ChannelSettings {
            restart_backoff: Duration::from_millis(config.worker.probe_restart_backoff_ms),
            ..action_settings
        };

        Ok(Self::from_channels(
            WorkerChannel::new("action", program.clone(), args.clone(), action_settings),
            WorkerChannel::new("probe", program, args, probe_settings),
        ))
    }

    pub fn from_channels(action: WorkerChannel, probe: WorkerChannel) -> Self {
        Self { action, probe }
    }
}

#[async_trait::async_trait]
impl PlatformBridge for WorkerBridge {
    fn start(&self) {
        if !self.action.ensure_started() {
            warn!("Воркер действия пока недоступен, будет повторная попытка");
        }
    }

    fn perform_action(&self) {
        match self.action.send(WorkerCommand::Trigger) {
            Ok(()) => debug!("TRIGGER отправлен воркеру действия"),
            Err(e) => {
                // Срабатывание угла не должно теряться из-за перезапуска воркера
                warn!("{}; выполняем действие одноразовым воркером", e);
                if let Err(e) = self
                    .action
                    .spawn_oneshot(&[WorkerCommand::Trigger, WorkerCommand::Exit])
                {
                    error!("Не удалось запустить одноразовый воркер: {}", e);
                }
                self.action.ensure_started();
            }
        }
    }

    async fn probe_foreground(&self) -> ForegroundInfo {
        let line = self.probe.request(WorkerCommand::Status).await;
        ForegroundInfo::from_status_line(&line)
    }

    async fn set_foreground_monitoring(&self, enabled: bool) {
        if enabled {
            if !self.probe.is_running() {
                info!("Запуск мониторинга окна переднего плана");
                self.probe.ensure_started();
            }
        } else {
            if self.probe.is_running() {
                info!("Мониторинг окна переднего плана больше не нужен");
            }
            // Снимает и запланированный перезапуск упавшего воркера
            self.probe.stop().await;
        }
    }

    async fn shutdown(&self) {
        info!("Остановка воркеров платформы");
        tokio::join!(self.probe.shutdown(), self.action.shutdown());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> ChannelSettings {
        ChannelSettings {
            response_timeout: Duration::from_millis(400),
            restart_backoff: Duration::from_millis(50),
            exit_grace: Duration::from_millis(300),
        }
    }

    fn channel(name: &'static str, script: &str) -> WorkerChannel {
        WorkerChannel::new(
            name,
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
            settings(),
        )
    }

    const STATUS_WORKER: &str = r#"while read line; do
  case "$line" in
    STATUS) echo '{"exe":"/usr/bin/mpv","title":"movie.mkv","isRealFullscreen":true}' ;;
    EXIT) exit 0 ;;
  esac
done"#;

    #[tokio::test]
    async fn test_probe_parses_worker_status() {
        let bridge = WorkerBridge::from_channels(
            channel("action", "while read line; do :; done"),
            channel("probe", STATUS_WORKER),
        );

        let info = bridge.probe_foreground().await;
        assert_eq!(info.exe_basename(), "mpv");
        assert!(info.is_real_fullscreen);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_garbage_status_becomes_empty_info() {
        let bridge = WorkerBridge::from_channels(
            channel("action", "while read line; do :; done"),
            channel("probe", "while read line; do echo 'not json'; done"),
        );

        assert!(bridge.probe_foreground().await.is_empty());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_falls_back_to_oneshot_worker() {
        let marker = tempfile::NamedTempFile::new().unwrap();
        let path = marker.path().display().to_string();
        // Воркер, который пишет в файл каждую полученную команду TRIGGER
        let script = format!(
            "while read line; do [ \"$line\" = TRIGGER ] && echo hit >> '{}'; [ \"$line\" = EXIT ] && exit 0; done",
            path
        );
        let bridge = WorkerBridge::from_channels(channel("action", &script), channel("probe", STATUS_WORKER));

        // Постоянный воркер не запущен - действие уходит одноразовому процессу
        bridge.perform_action();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let hits = std::fs::read_to_string(marker.path()).unwrap();
        assert!(hits.lines().count() >= 1);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitoring_toggle_starts_and_stops_probe() {
        let bridge = WorkerBridge::from_channels(
            channel("action", "while read line; do :; done"),
            channel("probe", STATUS_WORKER),
        );

        bridge.set_foreground_monitoring(true).await;
        assert!(bridge.probe.is_running());

        bridge.set_foreground_monitoring(false).await;
        assert!(!bridge.probe.is_running());

        bridge.shutdown().await;
    }
}
