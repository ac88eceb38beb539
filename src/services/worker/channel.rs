use super::pending::PendingQueue;
use super::protocol::{WorkerCommand, EMPTY_RESPONSE};
use crate::corner_error;
use crate::error::{CornerError, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Тайминги одного канала
#[derive(Debug, Clone, Copy)]
pub struct ChannelSettings {
    pub response_timeout: Duration,
    pub restart_backoff: Duration,
    pub exit_grace: Duration,
}

/// Долгоживущий воркер-подпроцесс с построчным протоколом на stdin/stdout
///
/// Клонирование дешёвое: все клоны работают с одним и тем же воркером.
#[derive(Clone)]
pub struct WorkerChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    name: &'static str,
    program: PathBuf,
    args: Vec<String>,
    settings: ChannelSettings,
    state: Mutex<ChannelState>,
    shutting_down: AtomicBool,
}

#[derive(Default)]
struct ChannelState {
    worker: Option<WorkerHandle>,
    generation: u64,
    enabled: bool,
    restart_scheduled: bool,
    spawn_failures: u32,
}

/// Живой экземпляр воркера; поколение отличает его от уже перезапущенных
struct WorkerHandle {
    generation: u64,
    stdin_tx: mpsc::UnboundedSender<WorkerCommand>,
    pending: Arc<Mutex<PendingQueue>>,
    kill_tx: Option<oneshot::Sender<()>>,
    exited: watch::Receiver<bool>,
}

impl WorkerChannel {
    pub fn new(name: &'static str, program: PathBuf, args: Vec<String>, settings: ChannelSettings) -> Self {
        info!("Инициализация канала воркера '{}': {:?} {:?}", name, program, args);

        Self {
            inner: Arc::new(ChannelInner {
                name,
                program,
                args,
                settings,
                state: Mutex::new(ChannelState::default()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().worker.is_some()
    }

    /// Запустить воркер, если он ещё не запущен; `false` если запуск не удался
    pub fn ensure_started(&self) -> bool {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return false;
        }

        let mut state = self.inner.state.lock();
        state.enabled = true;
        if state.worker.is_some() {
            return true;
        }

        let generation = state.generation + 1;
        match self.inner.spawn_worker(generation) {
            Ok(handle) => {
                if state.spawn_failures > 0 {
                    info!("Воркер '{}' снова запущен после {} неудачных попыток", self.inner.name, state.spawn_failures);
                }
                state.generation = generation;
                state.spawn_failures = 0;
                state.worker = Some(handle);
                true
            }
            Err(e) => {
                state.spawn_failures += 1;
                // Не засоряем лог при бесконечных повторах
                if state.spawn_failures == 1 || state.spawn_failures % 20 == 0 {
                    warn!(
                        "Не удалось запустить воркер '{}' (попытка {}): {}",
                        self.inner.name, state.spawn_failures, e
                    );
                } else {
                    debug!("Повторная ошибка запуска воркера '{}': {}", self.inner.name, e);
                }
                if !state.restart_scheduled {
                    state.restart_scheduled = true;
                    drop(state);
                    self.inner.schedule_restart();
                }
                false
            }
        }
    }

    /// Команда без ответа (TRIGGER); ошибка если воркера сейчас нет
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        let state = self.inner.state.lock();
        match state.worker.as_ref() {
            Some(worker) => worker
                .stdin_tx
                .send(command)
                .map_err(|_| corner_error!(worker, "Канал stdin воркера '{}' закрыт", self.inner.name)),
            None => CornerError::worker_unavailable(format!("Воркер '{}' не запущен", self.inner.name)),
        }
    }

    /// Запрос с ответом одной строкой; при любой неудаче возвращает `{}`
    pub async fn request(&self, command: WorkerCommand) -> String {
        if !self.ensure_started() {
            return EMPTY_RESPONSE.to_string();
        }

        let enqueued = {
            let state = self.inner.state.lock();
            state.worker.as_ref().map(|worker| {
                // Постановка в очередь и запись в stdin под одной блокировкой - порядок совпадает
                let rx = worker.pending.lock().push(command, self.inner.settings.response_timeout);
                let sent = worker.stdin_tx.send(command).is_ok();
                (rx, sent, worker.generation, Arc::clone(&worker.pending))
            })
        };

        let Some((rx, sent, generation, pending)) = enqueued else {
            return EMPTY_RESPONSE.to_string();
        };
        if !sent {
            debug!("Воркер '{}' не принял {}: stdin закрыт", self.inner.name, command);
            return EMPTY_RESPONSE.to_string();
        }

        match timeout(self.inner.settings.response_timeout, rx).await {
            Ok(Ok(line)) => line,
            Ok(Err(_)) => EMPTY_RESPONSE.to_string(),
            Err(_) => {
                warn!(
                    "Воркер '{}' не ответил на {} за {:?}",
                    self.inner.name, command, self.inner.settings.response_timeout
                );
                let hung = pending
                    .lock()
                    .oldest_overdue(Instant::now(), self.inner.settings.response_timeout);
                if hung {
                    warn!("Воркер '{}' завис, перезапускаем", self.inner.name);
                    self.inner.retire(generation, "нет ответа");
                }
                EMPTY_RESPONSE.to_string()
            }
        }
    }

    /// Одноразовый подпроцесс: выполнить команды и выйти
    pub fn spawn_oneshot(&self, commands: &[WorkerCommand]) -> Result<()> {
        let mut child = Command::new(&self.inner.program)
            .args(&self.inner.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| corner_error!(internal, "stdin одноразового воркера не подключён"))?;
        let payload: String = commands.iter().map(WorkerCommand::as_line).collect();
        let name = self.inner.name;

        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                warn!("Не удалось передать команды одноразовому воркеру '{}': {}", name, e);
            }
            drop(stdin);

            match child.wait().await {
                Ok(status) if status.success() => debug!("Одноразовый воркер '{}' завершился", name),
                Ok(status) => error!("Одноразовый воркер '{}' завершился с {}", name, status),
                Err(e) => error!("Ошибка ожидания одноразового воркера '{}': {}", name, e),
            }
        });

        Ok(())
    }

    /// Остановить текущий воркер без перезапуска; безопасно вызывать повторно
    pub async fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            state.enabled = false;
            state.worker.take()
        };

        let Some(mut handle) = handle else {
            return;
        };

        info!("Остановка воркера '{}'", self.inner.name);
        let _ = handle.stdin_tx.send(WorkerCommand::Exit);
        let drained = handle.pending.lock().drain();
        if drained > 0 {
            debug!("Сброшено {} ожидающих запросов воркера '{}'", drained, self.inner.name);
        }

        let grace = self.inner.settings.exit_grace;
        if timeout(grace, handle.exited.wait_for(|exited| *exited)).await.is_err() {
            warn!("Воркер '{}' не завершился за {:?}, убиваем", self.inner.name, grace);
            if let Some(kill_tx) = handle.kill_tx.take() {
                let _ = kill_tx.send(());
            }
        }
    }

    /// Окончательная остановка: после неё канал больше не перезапускается
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.stop().await;
    }
}

impl ChannelInner {
    fn spawn_worker(self: &Arc<Self>, generation: u64) -> Result<WorkerHandle> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| corner_error!(internal, "stdin воркера не подключён"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| corner_error!(internal, "stdout воркера не подключён"))?;

        info!("Воркер '{}' запущен (pid {:?}, поколение {})", self.name, child.id(), generation);

        let pending = Arc::new(Mutex::new(PendingQueue::new()));
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited) = watch::channel(false);

        tokio::spawn(Arc::clone(self).write_loop(generation, stdin, stdin_rx));
        tokio::spawn(Arc::clone(self).read_loop(generation, stdout, Arc::clone(&pending)));
        tokio::spawn(Arc::clone(self).wait_loop(generation, child, kill_rx, exited_tx));

        Ok(WorkerHandle {
            generation,
            stdin_tx,
            pending,
            kill_tx: Some(kill_tx),
            exited,
        })
    }

    async fn write_loop(
        self: Arc<Self>,
        generation: u64,
        mut stdin: ChildStdin,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    ) {
        while let Some(command) = commands.recv().await {
            let written = match stdin.write_all(command.as_line().as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            };

            if let Err(e) = written {
                warn!("Ошибка записи в stdin воркера '{}': {}", self.name, e);
                self.retire(generation, "stdin закрыт");
                return;
            }

            if command == WorkerCommand::Exit {
                break;
            }
        }
        // stdin закрывается при выходе из цикла
    }

    async fn read_loop(self: Arc<Self>, generation: u64, stdout: ChildStdout, pending: Arc<Mutex<PendingQueue>>) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() && pending.lock().is_empty() {
                        continue;
                    }
                    let mut queue = pending.lock();
                    if queue.is_empty() {
                        debug!("Лишняя строка от воркера '{}': {}", self.name, line);
                    } else if !queue.complete_oldest(&line) {
                        debug!("Запоздавший ответ воркера '{}' отброшен", self.name);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Ошибка чтения stdout воркера '{}': {}", self.name, e);
                    break;
                }
            }
        }

        self.retire(generation, "stdout закрыт");
    }

    async fn wait_loop(
        self: Arc<Self>,
        generation: u64,
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        exited_tx: watch::Sender<bool>,
    ) {
        let status = tokio::select! {
            status = child.wait() => status,
            Ok(()) = kill_rx => {
                if let Err(e) = child.start_kill() {
                    debug!("Не удалось послать kill воркеру '{}': {}", self.name, e);
                }
                child.wait().await
            }
        };

        let _ = exited_tx.send(true);
        self.log_exit(status);
        self.retire(generation, "процесс завершился");
    }

    fn log_exit(&self, status: std::io::Result<ExitStatus>) {
        match status {
            Ok(status) if status.success() => info!("Воркер '{}' завершился корректно", self.name),
            Ok(status) => warn!("Воркер '{}' завершился: {}", self.name, status),
            Err(e) => error!("Ошибка ожидания воркера '{}': {}", self.name, e),
        }
    }

    /// Снять воркер указанного поколения: сбросить очередь, добить процесс, запланировать перезапуск
    ///
    /// Срабатывает только один раз на поколение; остальные вызовы - no-op.
    fn retire(self: &Arc<Self>, generation: u64, reason: &str) {
        let restart = {
            let mut state = self.state.lock();
            let is_current = matches!(&state.worker, Some(worker) if worker.generation == generation);
            if !is_current {
                return;
            }

            if let Some(mut handle) = state.worker.take() {
                let drained = handle.pending.lock().drain();
                if let Some(kill_tx) = handle.kill_tx.take() {
                    let _ = kill_tx.send(());
                }
                warn!(
                    "Воркер '{}' недоступен ({}), сброшено запросов: {}",
                    self.name, reason, drained
                );
            }

            let restart = state.enabled && !state.restart_scheduled && !self.shutting_down.load(Ordering::SeqCst);
            if restart {
                state.restart_scheduled = true;
            }
            restart
        };

        if restart {
            self.schedule_restart();
        }
    }

    fn schedule_restart(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            sleep(inner.settings.restart_backoff).await;

            let proceed = {
                let mut state = inner.state.lock();
                state.restart_scheduled = false;
                state.enabled && state.worker.is_none() && !inner.shutting_down.load(Ordering::SeqCst)
            };

            if proceed {
                debug!("Перезапуск воркера '{}'", inner.name);
                WorkerChannel { inner }.ensure_started();
            }
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn settings() -> ChannelSettings {
        ChannelSettings {
            response_timeout: Duration::from_millis(400),
            restart_backoff: Duration::from_millis(50),
            exit_grace: Duration::from_millis(300),
        }
    }

    fn shell_channel(script: &str) -> WorkerChannel {
        WorkerChannel::new(
            "test",
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
            settings(),
        )
    }

    /// Воркер-заглушка: на каждый STATUS отвечает пронумерованным JSON, EXIT завершает
    const ECHO_WORKER: &str = r#"n=0
while read line; do
  case "$line" in
    STATUS) n=$((n+1)); echo "{\"title\":\"window-$n\"}" ;;
    EXIT) exit 0 ;;
  esac
done"#;

    #[tokio::test]
    async fn test_status_round_trip_returns_exact_line() {
        let channel = shell_channel(ECHO_WORKER);

        assert_eq!(channel.request(WorkerCommand::Status).await, "{\"title\":\"window-1\"}");
        assert_eq!(channel.request(WorkerCommand::Status).await, "{\"title\":\"window-2\"}");

        channel.shutdown().await;
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_submission_order() {
        let channel = shell_channel(ECHO_WORKER);
        assert!(channel.ensure_started());

        let (a, b, c) = tokio::join!(
            channel.request(WorkerCommand::Status),
            channel.request(WorkerCommand::Status),
            channel.request(WorkerCommand::Status),
        );
        // join! опрашивает запросы по порядку, значит в очередь они встают a, b, c
        assert_eq!(a, "{\"title\":\"window-1\"}");
        assert_eq!(b, "{\"title\":\"window-2\"}");
        assert_eq!(c, "{\"title\":\"window-3\"}");

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_late_response_never_reaches_next_request() {
        // Первый ответ приходит уже после таймаута запроса
        let channel = shell_channel(
            r#"n=0
while read line; do
  case "$line" in
    STATUS) n=$((n+1)); [ "$n" -eq 1 ] && sleep 0.6; echo "{\"title\":\"window-$n\"}" ;;
    EXIT) exit 0 ;;
  esac
done"#,
        );

        assert_eq!(channel.request(WorkerCommand::Status).await, EMPTY_RESPONSE);
        assert_eq!(channel.request(WorkerCommand::Status).await, "{\"title\":\"window-2\"}");
        assert!(channel.is_running(), "опоздание меньше двух таймаутов не считается зависанием");

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_silent_worker_times_out_with_empty_object() {
        let channel = shell_channel("while read line; do :; done");

        let started = Instant::now();
        let response = channel.request(WorkerCommand::Status).await;

        assert_eq!(response, EMPTY_RESPONSE);
        assert!(started.elapsed() >= settings().response_timeout);

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_crashed_worker_is_restarted() {
        // Первый STATUS получает ответ, после чего процесс падает
        let channel = shell_channel(r#"read line; echo '{"title":"once"}'; exit 3"#);

        assert_eq!(channel.request(WorkerCommand::Status).await, "{\"title\":\"once\"}");

        sleep(Duration::from_millis(300)).await;
        assert!(channel.is_running(), "канал должен перезапустить воркер после падения");
        assert_eq!(channel.request(WorkerCommand::Status).await, "{\"title\":\"once\"}");

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_program_degrades_to_empty_response() {
        let channel = WorkerChannel::new(
            "missing",
            PathBuf::from("/nonexistent/corner-worker"),
            Vec::new(),
            settings(),
        );

        assert!(!channel.ensure_started());
        assert_eq!(channel.request(WorkerCommand::Status).await, EMPTY_RESPONSE);
        assert!(channel.send(WorkerCommand::Trigger).is_err());
        assert!(channel.spawn_oneshot(&[WorkerCommand::Trigger, WorkerCommand::Exit]).is_err());

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_kills_stubborn_worker() {
        // Игнорирует EXIT, поэтому остановка должна дойти до kill
        let channel = shell_channel("trap '' TERM; while read line; do :; done; exec sleep 30");
        assert!(channel.ensure_started());

        channel.stop().await;
        channel.stop().await;
        assert!(!channel.is_running());

        // После stop() канал не перезапускается сам
        sleep(Duration::from_millis(200)).await;
        assert!(!channel.is_running());
    }
}
