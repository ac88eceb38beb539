use std::fmt;

/// Ответ-заглушка при таймауте, падении воркера или мусоре в выводе
pub const EMPTY_RESPONSE: &str = "{}";

/// Строковые команды протокола stdin воркера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCommand {
    /// Выполнить действие; ответа нет
    Trigger,
    /// Описать окно переднего плана одной строкой JSON
    Status,
    /// Корректно завершиться с кодом 0
    Exit,
}

impl WorkerCommand {
    pub fn as_line(&self) -> &'static str {
        match self {
            WorkerCommand::Trigger => "TRIGGER\n",
            WorkerCommand::Status => "STATUS\n",
            WorkerCommand::Exit => "EXIT\n",
        }
    }

    /// Нераспознанные строки воркер игнорирует, поэтому здесь только точное совпадение
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "TRIGGER" => Some(WorkerCommand::Trigger),
            "STATUS" => Some(WorkerCommand::Status),
            "EXIT" => Some(WorkerCommand::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_line().trim_end())
    }
}
