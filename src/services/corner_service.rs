use crate::config::{Config, Preferences};
use crate::corner_error;
use crate::error::Result;
use crate::events::{EngineCommand, EngineNotification, ForegroundInfo};
use crate::services::corner_engine::{CornerEngine, TickInput, TickOutcome};
use crate::services::display::{DisplayCache, DisplayService};
use crate::services::foreground_probe::{ForegroundProbe, ProbeRequest};
use crate::services::platform::PlatformBridge;
use crate::services::preference_store::PreferenceStore;
use crate::services::scheduler::{PollScheduler, IDLE_POLL_MAX_DELAY};
use crate::services::suppression::{SuppressionDecision, SuppressionPolicy};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Тайминги цикла сервиса
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub foreground_poll_interval: Duration,
    pub foreground_refresh_interval: Duration,
    pub display_refresh_interval: Duration,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            foreground_poll_interval: Duration::from_millis(config.foreground.poll_interval_ms),
            foreground_refresh_interval: Duration::from_millis(config.foreground.refresh_interval_ms),
            display_refresh_interval: Duration::from_millis(config.display.refresh_interval_ms),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Ручка для UI и `main`: команды внутрь, уведомления наружу
#[derive(Clone)]
pub struct ServiceHandle {
    commands: mpsc::Sender<EngineCommand>,
    notifications: broadcast::Sender<EngineNotification>,
}

impl ServiceHandle {
    pub async fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|e| corner_error!(service_unavailable, "Сервис угла уже остановлен: {}", e.0))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineNotification> {
        self.notifications.subscribe()
    }
}

/// Результат STATUS, вернувшийся в цикл сервиса
#[derive(Debug)]
struct ProbeResult {
    info: ForegroundInfo,
    sequence: u64,
    issued_at: Instant,
}

/// Единственный владелец состояния: все изменения происходят в одном цикле `run`
pub struct CornerService {
    settings: ServiceSettings,
    bridge: Arc<dyn PlatformBridge>,
    display: Arc<dyn DisplayService>,
    store: Arc<dyn PreferenceStore>,
    preferences: Preferences,
    engine: CornerEngine,
    scheduler: PollScheduler,
    probe: ForegroundProbe,
    displays: DisplayCache,
    suppression: SuppressionDecision,
    monitoring: bool,
    /// Снимки с номером не меньше этого запрошены после последнего срабатывания
    trigger_boundary: u64,
    /// Ждём снимок с номером не меньше этого, чтобы исключить программу в фокусе
    exclude_focused_after: Option<u64>,
    cursor_failures: u32,
    display_failures: u32,
    commands: mpsc::Receiver<EngineCommand>,
    probe_tx: mpsc::UnboundedSender<ProbeResult>,
    probe_rx: mpsc::UnboundedReceiver<ProbeResult>,
    notifications: broadcast::Sender<EngineNotification>,
}

impl CornerService {
    pub fn new(
        settings: ServiceSettings,
        bridge: Arc<dyn PlatformBridge>,
        display: Arc<dyn DisplayService>,
        store: Arc<dyn PreferenceStore>,
    ) -> (Self, ServiceHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();

        let preferences = store.load();
        info!(
            "Настройки: угол {}, дисплей {}, скорость {}, подавление в полноэкранном режиме: {}, исключений: {}",
            preferences.corner,
            preferences.display,
            preferences.speed,
            preferences.disable_on_fullscreen,
            preferences.excluded_programs.len()
        );

        let handle = ServiceHandle {
            commands: commands_tx,
            notifications: notifications.clone(),
        };

        let service = Self {
            probe: ForegroundProbe::new(settings.foreground_refresh_interval),
            settings,
            bridge,
            display,
            store,
            preferences,
            engine: CornerEngine::new(),
            scheduler: PollScheduler::new(),
            displays: DisplayCache::new(),
            suppression: SuppressionDecision::NONE,
            monitoring: false,
            trigger_boundary: 0,
            exclude_focused_after: None,
            cursor_failures: 0,
            display_failures: 0,
            commands,
            probe_tx,
            probe_rx,
            notifications,
        };

        (service, handle)
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Запуск сервиса угла");

        self.bridge.start();
        self.refresh_displays().await;
        self.apply_monitoring().await;
        self.scheduler.start(Instant::now());

        let mut foreground_timer = interval(self.settings.foreground_poll_interval);
        foreground_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut display_timer = interval(self.settings.display_refresh_interval);
        display_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Первые тики interval срабатывают сразу, а стартовые опросы уже сделаны
        foreground_timer.reset();
        display_timer.reset();

        loop {
            let poll_deadline = self.scheduler.deadline();

            tokio::select! {
                _ = wait_for(poll_deadline) => {
                    self.poll_tick().await;
                }
                _ = foreground_timer.tick() => {
                    if self.monitoring {
                        self.request_probe(true);
                    }
                }
                _ = display_timer.tick() => {
                    self.refresh_displays().await;
                }
                Some(result) = self.probe_rx.recv() => {
                    self.on_probe_result(result).await;
                }
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn poll_tick(&mut self) {
        if !self.scheduler.fire() {
            return;
        }

        let point = match self.display.cursor_position().await {
            Ok(point) => {
                self.cursor_failures = 0;
                point
            }
            Err(e) => {
                self.cursor_failures += 1;
                if self.cursor_failures == 1 {
                    warn!("Не удалось получить позицию курсора: {}", e);
                }
                self.scheduler.schedule(IDLE_POLL_MAX_DELAY, Instant::now());
                return;
            }
        };

        let now = Instant::now();
        let bounds = self.displays.target_bounds(&self.preferences.display);
        let corner = self.preferences.corner;
        let near_corner = bounds.map(|b| corner.is_near(point, &b)).unwrap_or(false);

        // Состояние окна должно быть свежим именно тогда, когда срабатывание вероятно
        if near_corner && self.monitoring {
            self.request_probe(false);
        }

        let decision = self.evaluate_suppression(now);
        let input = TickInput {
            point,
            bounds,
            corner,
            cooldown: self.preferences.speed.cooldown(),
            suppressed: decision.suppressed,
            self_overlay: self.is_self_overlay(&decision),
            now,
        };

        let outcome = self.engine.tick(input, self.bridge.as_ref());
        crate::trace_if_enabled!("Тик {} -> {:?}", point, outcome);
        if matches!(outcome, TickOutcome::Fired { .. }) {
            self.on_triggered();
        }

        let delay = self
            .scheduler
            .next_delay(point, self.preferences.speed.poll_interval(), near_corner);
        self.scheduler.schedule(delay, Instant::now());
    }

    fn on_triggered(&mut self) {
        self.notify(EngineNotification::Triggered {
            corner: self.preferences.corner,
        });

        // Экран задач, открытый этим срабатыванием, должен быть виден как можно скорее
        self.trigger_boundary = self.probe.next_sequence();
        if self.monitoring {
            self.probe.invalidate();
            self.request_probe(true);
        }
    }

    /// Оверлей считается нашим, только если снимок запрошен после последнего срабатывания
    fn is_self_overlay(&self, decision: &SuppressionDecision) -> bool {
        decision.task_view_like
            && self
                .probe
                .snapshot()
                .is_some_and(|snapshot| snapshot.sequence >= self.trigger_boundary)
    }

    fn evaluate_suppression(&mut self, now: Instant) -> SuppressionDecision {
        let info = if self.monitoring { self.probe.info() } else { None };
        let decision = SuppressionPolicy::evaluate(info, &self.preferences, self.engine.since_last_trigger(now));

        if decision != self.suppression {
            if decision.suppressed {
                info!(
                    "Срабатывание подавлено: {}",
                    if decision.excluded { "программа в исключениях" } else { "полноэкранное окно" }
                );
            } else if self.suppression.suppressed {
                info!("Подавление снято");
            }
            if decision.task_view_like && !self.suppression.task_view_like {
                debug!("На переднем плане экран переключения задач");
            }
            self.suppression = decision;
        }

        decision
    }

    fn request_probe(&mut self, force: bool) {
        let now = Instant::now();
        let ProbeRequest::Start(sequence) = self.probe.request(force, now) else {
            return;
        };

        let bridge = Arc::clone(&self.bridge);
        let results = self.probe_tx.clone();
        tokio::spawn(async move {
            let info = bridge.probe_foreground().await;
            let _ = results.send(ProbeResult {
                info,
                sequence,
                issued_at: now,
            });
        });
    }

    async fn on_probe_result(&mut self, result: ProbeResult) {
        let accepted = self.probe.accept(result.info, result.sequence, result.issued_at);

        if accepted.changed {
            if let Some(info) = self.probe.info() {
                debug!("Окно переднего плана: {}", info);
                self.notify(EngineNotification::ForegroundChanged(info.clone()));
            }
        }

        let now = Instant::now();
        self.evaluate_suppression(now);

        if let Some(after) = self.exclude_focused_after {
            let ready = self.probe.snapshot().is_some_and(|s| s.sequence >= after);
            if ready {
                self.exclude_focused_after = None;
                self.exclude_focused_program().await;
            }
        }

        if accepted.rerun {
            self.request_probe(true);
        }
    }

    async fn exclude_focused_program(&mut self) {
        let exe = self.probe.info().map(|info| info.exe.clone()).unwrap_or_default();
        if exe.is_empty() {
            warn!("Не удалось определить программу в фокусе, исключение не добавлено");
            // Опрос мог запустить воркер, который при текущих настройках не нужен
            self.bridge.set_foreground_monitoring(self.monitoring).await;
            return;
        }

        let mut preferences = self.preferences.clone();
        if preferences.add_exclusion(&exe) {
            info!("В исключения добавлена программа в фокусе: {}", exe);
            self.commit_preferences(preferences).await;
        } else {
            info!("Программа {} уже в исключениях", exe);
        }
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        info!("Команда: {}", command);
        let mut preferences = self.preferences.clone();

        match command {
            EngineCommand::SetCorner(corner) => {
                preferences.corner = corner;
                self.engine.reset();
            }
            EngineCommand::SetDisplay(display) => {
                preferences.display = display;
                self.engine.reset();
            }
            EngineCommand::SetSpeed(speed) => {
                preferences.speed = speed;
                self.scheduler.restart(&mut self.engine, Instant::now());
            }
            EngineCommand::ToggleFullscreenSuppression => {
                preferences.disable_on_fullscreen = !preferences.disable_on_fullscreen;
            }
            EngineCommand::SetFullscreenSuppression(enabled) => {
                preferences.disable_on_fullscreen = enabled;
            }
            EngineCommand::AddExclusion(exe) => {
                if !preferences.add_exclusion(&exe) {
                    info!("Исключение '{}' пустое или уже есть в списке", exe);
                }
            }
            EngineCommand::ExcludeFocusedProgram => {
                self.exclude_focused_after = Some(self.probe.next_sequence());
                self.probe.invalidate();
                self.request_probe(true);
                return;
            }
            EngineCommand::RemoveExclusion(index) => match preferences.remove_exclusion(index) {
                Some(removed) => info!("Исключение удалено: {}", removed),
                None => warn!("Нет исключения с индексом {}", index),
            },
            EngineCommand::ClearExclusions => preferences.excluded_programs.clear(),
            // Завершение обрабатывается в цикле run
            EngineCommand::Shutdown => return,
        }

        self.commit_preferences(preferences).await;
    }

    /// Сохранить новые настройки, уведомить UI и пересмотреть мониторинг окна
    async fn commit_preferences(&mut self, preferences: Preferences) {
        if preferences == self.preferences {
            return;
        }

        let suppression_changed = preferences.disable_on_fullscreen != self.preferences.disable_on_fullscreen
            || preferences.excluded_programs != self.preferences.excluded_programs;
        self.preferences = preferences;

        if let Err(e) = self.store.save(&self.preferences) {
            warn!("Не удалось сохранить настройки: {}", e);
        }
        self.notify(EngineNotification::ConfigurationChanged(self.preferences.clone()));

        if suppression_changed {
            self.apply_monitoring().await;
        }
    }

    async fn apply_monitoring(&mut self) {
        let wanted = self.preferences.should_monitor_foreground();
        if wanted != self.monitoring {
            info!(
                "Мониторинг окна переднего плана {}",
                if wanted { "включён" } else { "выключен" }
            );
        }
        self.monitoring = wanted;
        self.bridge.set_foreground_monitoring(wanted).await;

        if wanted {
            self.probe.invalidate();
            self.request_probe(true);
        } else {
            self.probe.clear();
        }
        self.evaluate_suppression(Instant::now());
    }

    async fn refresh_displays(&mut self) {
        match self.display.displays().await {
            Ok(displays) => {
                self.display_failures = 0;
                if self.displays.update(displays) {
                    info!("Конфигурация мониторов изменилась: {} шт.", self.displays.len());
                    for shown in self.displays.displays() {
                        debug!("  {} {}{}", shown.id, shown.bounds, if shown.primary { " (основной)" } else { "" });
                    }
                    // Вовлечённость снимет сам тик, если курсор оказался вне целевого дисплея
                    self.notify(EngineNotification::DisplaysChanged(self.displays.len()));
                }
            }
            Err(e) => {
                self.display_failures += 1;
                if self.display_failures == 1 {
                    warn!("Не удалось получить список мониторов: {}", e);
                } else {
                    debug!("Повторная ошибка списка мониторов: {}", e);
                }
            }
        }
    }

    fn notify(&self, notification: EngineNotification) {
        // Ошибка означает лишь отсутствие подписчиков
        let _ = self.notifications.send(notification);
    }

    async fn shutdown(&mut self) {
        info!("Остановка сервиса угла");
        self.scheduler.stop();
        self.monitoring = false;
        self.probe.clear();
        self.bridge.shutdown().await;
        info!("Сервис угла остановлен");
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
