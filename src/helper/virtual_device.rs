use crate::corner_error;
use crate::error::Result;
use crate::mappings::KeyCombo;
use tokio::time::Duration;
use tracing::{debug, info};

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;
const SYN_REPORT: i32 = 0;

/// X-серверу нужно время, чтобы подхватить только что созданное устройство
pub const DEVICE_SETTLE: Duration = Duration::from_millis(120);

/// Виртуальная клавиатура uinput, через которую воркер нажимает сочетание
pub struct VirtualDevice {
    device: Option<uinput::Device>,
    device_name: String,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Self::create_virtual_device(device_name)?)
        };

        Ok(Self {
            device,
            device_name: device_name.to_string(),
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| corner_error!(internal, "Не удалось создать виртуальное устройство '{}': {}", device_name, e))?;

        info!("Виртуальное устройство '{}' создано", device_name);
        Ok(device)
    }

    /// Нажать и отпустить сочетание: модификаторы первыми вниз, последними вверх
    pub fn tap_combo(&mut self, combo: &KeyCombo) -> Result<()> {
        if self.dry_run {
            info!("[DRY RUN] Нажатие сочетания {}", combo);
            return Ok(());
        }

        for code in combo.press_order() {
            self.send_key(code, true)?;
        }
        for code in combo.release_order() {
            self.send_key(code, false)?;
        }

        debug!("Сочетание {} отправлено через '{}'", combo, self.device_name);
        Ok(())
    }

    fn send_key(&mut self, code: u16, pressed: bool) -> Result<()> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| corner_error!(internal, "Виртуальное устройство недоступно"))?;

        let value = if pressed { 1 } else { 0 };
        device
            .write(EV_KEY, code as i32, value)
            .map_err(|e| corner_error!(internal, "Не удалось отправить событие клавиши {}: {}", code, e))?;

        // Каждое событие отдельным отчётом, чтобы порядок нажатий сохранился
        device
            .write(EV_SYN, SYN_REPORT, 0)
            .map_err(|e| corner_error!(internal, "Не удалось синхронизировать события: {}", e))?;

        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства");
        }
    }
}
