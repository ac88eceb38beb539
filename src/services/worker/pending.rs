use super::protocol::{WorkerCommand, EMPTY_RESPONSE};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

/// Один ожидающий ответа запрос
///
/// Запрос, у которого истёк таймаут, остаётся в очереди «надгробием»: его
/// получатель уже сброшен, и запоздавшая строка воркера уходит в никуда, а не
/// достаётся следующему запросу.
#[derive(Debug)]
pub struct PendingRequest {
    pub command: WorkerCommand,
    pub deadline: Instant,
    responder: oneshot::Sender<String>,
}

/// FIFO очередь запросов: i-я строка вывода принадлежит i-му запросу
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: WorkerCommand, timeout: Duration) -> oneshot::Receiver<String> {
        let (responder, rx) = oneshot::channel();
        self.entries.push_back(PendingRequest {
            command,
            deadline: Instant::now() + timeout,
            responder,
        });
        rx
    }

    /// Отдать строку самому старому запросу; `false` если получателя уже нет
    pub fn complete_oldest(&mut self, line: &str) -> bool {
        let Some(entry) = self.entries.pop_front() else {
            return false;
        };
        let trimmed = line.trim();
        let response = if trimmed.is_empty() { EMPTY_RESPONSE } else { trimmed };
        crate::debug_if_enabled!("Ответ воркера на {}: {}", entry.command, response);
        entry.responder.send(response.to_string()).is_ok()
    }

    /// Разрешить все ожидающие запросы пустым ответом
    pub fn drain(&mut self) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            let _ = entry.responder.send(EMPTY_RESPONSE.to_string());
        }
        count
    }

    /// Самый старый запрос просрочен больше чем на `grace`: воркер, скорее всего, завис
    pub fn oldest_overdue(&self, now: Instant, grace: Duration) -> bool {
        self.entries
            .front()
            .map(|entry| now >= entry.deadline + grace)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1500);

    #[tokio::test]
    async fn test_responses_pair_in_submission_order() {
        let mut queue = PendingQueue::new();
        let first = queue.push(WorkerCommand::Status, TIMEOUT);
        let second = queue.push(WorkerCommand::Status, TIMEOUT);

        assert!(queue.complete_oldest("{\"title\":\"one\"}\n"));
        assert!(queue.complete_oldest("{\"title\":\"two\"}"));

        assert_eq!(first.await.unwrap(), "{\"title\":\"one\"}");
        assert_eq!(second.await.unwrap(), "{\"title\":\"two\"}");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_request_swallows_its_late_response() {
        let mut queue = PendingQueue::new();
        let abandoned = queue.push(WorkerCommand::Status, TIMEOUT);
        let live = queue.push(WorkerCommand::Status, TIMEOUT);
        drop(abandoned);

        assert!(!queue.complete_oldest("{\"title\":\"late\"}"));
        assert!(queue.complete_oldest("{\"title\":\"fresh\"}"));
        assert_eq!(live.await.unwrap(), "{\"title\":\"fresh\"}");
    }

    #[tokio::test]
    async fn test_blank_line_becomes_empty_object() {
        let mut queue = PendingQueue::new();
        let rx = queue.push(WorkerCommand::Status, TIMEOUT);
        queue.complete_oldest("   ");
        assert_eq!(rx.await.unwrap(), EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn test_drain_resolves_everything_once() {
        let mut queue = PendingQueue::new();
        let a = queue.push(WorkerCommand::Status, TIMEOUT);
        let b = queue.push(WorkerCommand::Status, TIMEOUT);

        assert_eq!(queue.drain(), 2);
        assert_eq!(queue.drain(), 0);
        assert_eq!(a.await.unwrap(), EMPTY_RESPONSE);
        assert_eq!(b.await.unwrap(), EMPTY_RESPONSE);
        assert!(!queue.complete_oldest("{}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overdue_detection() {
        let mut queue = PendingQueue::new();
        let _rx = queue.push(WorkerCommand::Status, TIMEOUT);

        assert!(!queue.oldest_overdue(Instant::now(), TIMEOUT));
        tokio::time::advance(Duration::from_millis(3000)).await;
        assert!(queue.oldest_overdue(Instant::now(), TIMEOUT));
    }
}
