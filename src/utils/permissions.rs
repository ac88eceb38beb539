use crate::corner_error;
use crate::error::Result;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{info, warn};

const UINPUT_DEVICE: &str = "/dev/uinput";

/// Проверить, что воркер сможет открыть /dev/uinput на запись
pub fn check_uinput_access() -> Result<()> {
    check_not_root();
    check_device_access(Path::new(UINPUT_DEVICE))
}

fn check_device_access(device: &Path) -> Result<()> {
    if !device.exists() {
        return Err(corner_error!(
            service_unavailable,
            "{} не существует, возможно модуль uinput не загружен",
            device.display()
        ));
    }

    match OpenOptions::new().write(true).open(device) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", device.display());
            Ok(())
        }
        Err(e) => Err(corner_error!(
            permission,
            "Нет прав на запись в {}: {}. Добавьте пользователя в группу 'uinput' или 'input'",
            device.display(),
            e
        )),
    }
}

fn check_not_root() {
    if let Ok(user) = std::env::var("USER") {
        if user == "root" {
            warn!("⚠️  Воркер запущен от имени root!");
            warn!("   Рекомендуется добавить пользователя в группу 'uinput'");
            warn!("   и запускать приложение от имени обычного пользователя");
        }
    }
}

/// Получить рекомендуемые команды для настройки прав доступа
pub fn get_setup_commands() -> Vec<String> {
    vec![
        "# Добавить пользователя в группу uinput:".to_string(),
        "sudo usermod -a -G input,uinput $USER".to_string(),
        "# Загрузить модуль uinput:".to_string(),
        "sudo modprobe uinput".to_string(),
        "# Автоматическая загрузка модуля при загрузке системы:".to_string(),
        "echo 'uinput' | sudo tee /etc/modules-load.d/uinput.conf".to_string(),
        "# После выполнения команд перезайдите в систему".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CornerError;

    #[test]
    fn test_setup_commands() {
        let commands = get_setup_commands();
        assert!(!commands.is_empty());
        assert!(commands.iter().any(|cmd| cmd.contains("usermod")));
        assert!(commands.iter().any(|cmd| cmd.contains("modprobe")));
    }

    #[test]
    fn test_missing_device_reports_module() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_device_access(&dir.path().join("uinput"));
        assert!(matches!(result, Err(CornerError::ServiceUnavailable(_))));
    }

    #[test]
    fn test_writable_device_passes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(check_device_access(file.path()).is_ok());
    }
}
