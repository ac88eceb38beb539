//! Сторона воркера в построчном протоколе.
//!
//! Читает `TRIGGER` / `STATUS` / `EXIT` из stdin. На `STATUS` печатает ровно
//! одну строку компактного JSON (`{}` при любой ошибке), остальные команды
//! ответа не дают. Логи идут в stderr: stdout занят протоколом.

mod inspector;
mod virtual_device;

pub use inspector::WindowInspector;
pub use virtual_device::{VirtualDevice, DEVICE_SETTLE};

use crate::config::Config;
use crate::error::Result;
use crate::mappings::KeyCombo;
use crate::services::worker::{WorkerCommand, EMPTY_RESPONSE};
use crate::utils::permissions;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

const DEVICE_NAME: &str = "Corner TaskView Virtual Keyboard";

/// Состояние воркера между командами
struct Worker {
    combo: KeyCombo,
    dry_run: bool,
    device: Option<VirtualDevice>,
    inspector: WindowInspector,
}

impl Worker {
    fn new(combo: KeyCombo, dry_run: bool) -> Self {
        Self {
            combo,
            dry_run,
            device: None,
            inspector: WindowInspector::new(dry_run),
        }
    }

    /// Устройство создаётся при первом TRIGGER: воркеру опроса окна uinput не нужен
    async fn trigger(&mut self) {
        if self.device.is_none() {
            if !self.dry_run {
                if let Err(e) = permissions::check_uinput_access() {
                    warn!("{}", e);
                    for hint in permissions::get_setup_commands() {
                        warn!("   {}", hint);
                    }
                }
            }
            match VirtualDevice::new(DEVICE_NAME, self.dry_run) {
                Ok(device) => {
                    self.device = Some(device);
                    if !self.dry_run {
                        // X-серверу нужно время, чтобы подхватить новое устройство
                        tokio::time::sleep(DEVICE_SETTLE).await;
                    }
                }
                Err(e) => {
                    error!("Не удалось создать виртуальную клавиатуру: {}", e);
                    return;
                }
            }
        }

        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.tap_combo(&self.combo) {
                error!("Не удалось нажать {}: {}", self.combo, e);
                // Устройство могло пропасть; следующий TRIGGER создаст новое
                self.device = None;
            }
        }
    }

    async fn status(&self) -> String {
        match self.inspector.inspect().await {
            Ok(info) => info.to_status_line(),
            Err(e) => {
                debug!("Не удалось описать окно переднего плана: {}", e);
                EMPTY_RESPONSE.to_string()
            }
        }
    }

    async fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            match WorkerCommand::parse(&line) {
                Some(WorkerCommand::Trigger) => self.trigger().await,
                Some(WorkerCommand::Status) => {
                    let mut response = self.status().await;
                    response.push('\n');
                    output.write_all(response.as_bytes()).await?;
                    output.flush().await?;
                }
                Some(WorkerCommand::Exit) => {
                    debug!("Получена команда EXIT");
                    return Ok(());
                }
                None => debug!("Неизвестная команда проигнорирована: {:?}", line),
            }
        }

        debug!("stdin закрыт");
        Ok(())
    }
}

/// Точка входа подкоманды `worker`
pub async fn run(config: &Config, dry_run: bool) -> Result<()> {
    let combo = KeyCombo::parse(&config.action.keys)?;
    info!(
        "Воркер запущен (pid {}, сочетание {}, dry_run: {})",
        std::process::id(),
        combo,
        dry_run
    );

    let mut worker = Worker::new(combo, dry_run);
    worker
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    info!("Воркер завершает работу");
    Ok(())
}
