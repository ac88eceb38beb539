use thiserror::Error;

#[derive(Error, Debug)]
pub enum CornerError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка разбора JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка воркера: {0}")]
    Worker(String),

    #[error("Ошибка дисплея: {0}")]
    Display(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl CornerError {
    pub fn worker_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(CornerError::Worker(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, CornerError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! corner_error {
    (worker, $($arg:tt)*) => {
        $crate::error::CornerError::Worker(format!($($arg)*))
    };
    (display, $($arg:tt)*) => {
        $crate::error::CornerError::Display(format!($($arg)*))
    };
    (permission, $($arg:tt)*) => {
        $crate::error::CornerError::Permission(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::CornerError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::CornerError::Internal(format!($($arg)*))
    };
}
