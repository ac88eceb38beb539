use crate::events::{CursorPoint, DisplayBounds};
use crate::mappings::Corner;
use crate::services::platform::PlatformBridge;
use tokio::time::{Duration, Instant};
use tracing::info;

/// Нижняя граница кулдауна, когда срабатывание идёт в обход подавления
pub const SELF_OVERLAY_COOLDOWN_FLOOR: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngagementState {
    #[default]
    NotEngaged,
    Engaged,
}

/// Всё, что нужно одному тику движка
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub point: CursorPoint,
    /// Границы целевого дисплея; `None` если дисплеев нет
    pub bounds: Option<DisplayBounds>,
    pub corner: Corner,
    pub cooldown: Duration,
    pub suppressed: bool,
    /// На переднем плане наш же экран переключения задач, увиденный уже после последнего срабатывания
    pub self_overlay: bool,
    pub now: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    OutsideDisplay,
    OutsideCorner,
    Suppressed,
    AlreadyEngaged,
    CoolingDown,
    Fired { bypass: bool },
}

/// Машина состояний угла: одно срабатывание на одно «вхождение» в угол
#[derive(Debug, Default)]
pub struct CornerEngine {
    state: EngagementState,
    last_trigger: Option<Instant>,
}

impl CornerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    pub fn since_last_trigger(&self, now: Instant) -> Option<Duration> {
        self.last_trigger.map(|t| now.saturating_duration_since(t))
    }

    /// Сброс вовлечённости и кулдауна (смена угла, дисплея или пресета)
    pub fn reset(&mut self) {
        self.disengage();
        self.last_trigger = None;
    }

    fn disengage(&mut self) {
        self.state = EngagementState::NotEngaged;
    }

    /// Обход только для нового вхождения в угол: закрыть то, что открыли мы сами
    fn self_overlay_bypass(&self, input: &TickInput) -> bool {
        self.state == EngagementState::NotEngaged && input.self_overlay && self.last_trigger.is_some()
    }

    pub fn tick(&mut self, input: TickInput, bridge: &dyn PlatformBridge) -> TickOutcome {
        let Some(bounds) = input.bounds.filter(|b| b.contains(input.point)) else {
            self.disengage();
            return TickOutcome::OutsideDisplay;
        };

        if !input.corner.contains(input.point, &bounds) {
            self.disengage();
            return TickOutcome::OutsideCorner;
        }

        let bypass = self.self_overlay_bypass(&input);

        if input.suppressed && !bypass {
            return TickOutcome::Suppressed;
        }

        if self.state == EngagementState::Engaged {
            return TickOutcome::AlreadyEngaged;
        }

        let cooldown = if bypass {
            input.cooldown.max(SELF_OVERLAY_COOLDOWN_FLOOR)
        } else {
            input.cooldown
        };
        if let Some(last) = self.last_trigger {
            if input.now.saturating_duration_since(last) < cooldown {
                return TickOutcome::CoolingDown;
            }
        }

        self.last_trigger = Some(input.now);
        self.state = EngagementState::Engaged;
        if bypass {
            info!("Повторное срабатывание угла {} поверх собственного экрана задач", input.corner);
        } else {
            info!("Срабатывание угла {} в точке {}", input.corner, input.point);
        }
        bridge.perform_action();

        TickOutcome::Fired { bypass }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::events::ForegroundInfo;
    use crate::mappings::SpeedPreset;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Мост-заглушка, который только считает срабатывания
    #[derive(Default)]
    pub(crate) struct CountingBridge {
        pub triggers: AtomicUsize,
    }

    impl CountingBridge {
        pub fn count(&self) -> usize {
            self.triggers.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PlatformBridge for CountingBridge {
        fn start(&self) {}

        fn perform_action(&self) {
            self.triggers.fetch_add(1, Ordering::SeqCst);
        }

        async fn probe_foreground(&self) -> ForegroundInfo {
            ForegroundInfo::default()
        }

        async fn set_foreground_monitoring(&self, _enabled: bool) {}

        async fn shutdown(&self) {}
    }

    const SCREEN: DisplayBounds = DisplayBounds {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };

    fn input(x: i32, y: i32, now: Instant) -> TickInput {
        TickInput {
            point: CursorPoint::new(x, y),
            bounds: Some(SCREEN),
            corner: Corner::TopLeft,
            cooldown: SpeedPreset::FAST.cooldown(),
            suppressed: false,
            self_overlay: false,
            now,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_outside_corners_never_fires() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();

        for (x, y) in [(500, 500), (960, 0), (0, 540), (1919, 1079), (31, 31), (-5, -5)] {
            engine.tick(input(x, y, Instant::now()), &bridge);
            assert_eq!(engine.state(), EngagementState::NotEngaged);
            tokio::time::advance(Duration::from_millis(55)).await;
        }
        assert_eq!(bridge.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_top_left_scenario() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();

        assert_eq!(
            engine.tick(input(2, 2, Instant::now()), &bridge),
            TickOutcome::Fired { bypass: false }
        );

        // 2 секунды в углу при опросе каждые 55 мс
        for _ in 0..36 {
            tokio::time::advance(Duration::from_millis(55)).await;
            engine.tick(input(2, 2, Instant::now()), &bridge);
        }
        assert_eq!(bridge.count(), 1);

        // Ушли из угла, а затем отсчитываем время от последнего срабатывания
        let mut engine = CornerEngine::new();
        let bridge = CountingBridge::default();
        let t0 = Instant::now();
        engine.tick(input(2, 2, t0), &bridge);
        engine.tick(input(500, 500, t0 + Duration::from_millis(50)), &bridge);
        assert_eq!(engine.state(), EngagementState::NotEngaged);

        assert_eq!(
            engine.tick(input(2, 2, t0 + Duration::from_millis(150)), &bridge),
            TickOutcome::CoolingDown
        );
        assert_eq!(bridge.count(), 1);

        engine.tick(input(500, 500, t0 + Duration::from_millis(200)), &bridge);
        assert_eq!(
            engine.tick(input(2, 2, t0 + Duration::from_millis(1150)), &bridge),
            TickOutcome::Fired { bypass: false }
        );
        assert_eq!(bridge.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_limits_quick_reentries() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();

        // Несколько входов-выходов в пределах кулдауна
        for step in 0..8u64 {
            let at = t0 + Duration::from_millis(step * 100);
            engine.tick(input(1, 1, at), &bridge);
            engine.tick(input(400, 400, at + Duration::from_millis(50)), &bridge);
        }
        assert_eq!(bridge.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppression_blocks_trigger() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();

        for _ in 0..20 {
            let mut tick = input(0, 0, Instant::now());
            tick.suppressed = true;
            assert_eq!(engine.tick(tick, &bridge), TickOutcome::Suppressed);
            tokio::time::advance(Duration::from_millis(55)).await;
        }
        assert_eq!(bridge.count(), 0);
        assert_eq!(engine.state(), EngagementState::NotEngaged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_corner_clears_engagement_even_when_suppressed() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();

        engine.tick(input(0, 0, t0), &bridge);
        assert_eq!(engine.state(), EngagementState::Engaged);

        let mut away = input(800, 800, t0 + Duration::from_millis(10));
        away.suppressed = true;
        engine.tick(away, &bridge);
        assert_eq!(engine.state(), EngagementState::NotEngaged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_on_other_display_disengages() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();

        engine.tick(input(0, 0, t0), &bridge);
        let outcome = engine.tick(input(2500, 10, t0 + Duration::from_millis(10)), &bridge);
        assert_eq!(outcome, TickOutcome::OutsideDisplay);
        assert_eq!(engine.state(), EngagementState::NotEngaged);

        let mut no_display = input(0, 0, t0 + Duration::from_millis(20));
        no_display.bounds = None;
        assert_eq!(engine.tick(no_display, &bridge), TickOutcome::OutsideDisplay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_overlay_bypass_needs_reentry_and_floor() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();
        let mut instant = input(0, 0, t0);
        instant.cooldown = Duration::ZERO;

        assert_eq!(engine.tick(instant, &bridge), TickOutcome::Fired { bypass: false });

        // Экран задач исключённой программы: политика его подавляет, но это наш собственный оверлей
        let overlay = |at: Instant| TickInput {
            now: at,
            suppressed: true,
            self_overlay: true,
            ..instant
        };
        let away = |at: Instant| TickInput {
            point: CursorPoint::new(900, 900),
            ..overlay(at)
        };

        // Курсор не уходил из угла - обхода нет
        assert_eq!(
            engine.tick(overlay(t0 + Duration::from_millis(100)), &bridge),
            TickOutcome::AlreadyEngaged
        );

        engine.tick(away(t0 + Duration::from_millis(120)), &bridge);
        assert_eq!(
            engine.tick(overlay(t0 + Duration::from_millis(150)), &bridge),
            TickOutcome::CoolingDown
        );
        assert_eq!(
            engine.tick(overlay(t0 + Duration::from_millis(260)), &bridge),
            TickOutcome::Fired { bypass: true }
        );
        assert_eq!(
            engine.tick(overlay(t0 + Duration::from_millis(900)), &bridge),
            TickOutcome::AlreadyEngaged
        );
        assert_eq!(bridge.count(), 2);

        // Новое вхождение снова разрешает обход
        engine.tick(away(t0 + Duration::from_millis(950)), &bridge);
        assert_eq!(
            engine.tick(overlay(t0 + Duration::from_millis(1300)), &bridge),
            TickOutcome::Fired { bypass: true }
        );
        assert_eq!(bridge.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_pointer_over_own_overlay_fires_once() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();

        engine.tick(input(2, 2, Instant::now()), &bridge);
        for _ in 0..60 {
            tokio::time::advance(Duration::from_millis(55)).await;
            let held = TickInput {
                self_overlay: true,
                ..input(2, 2, Instant::now())
            };
            assert_eq!(engine.tick(held, &bridge), TickOutcome::AlreadyEngaged);
        }
        assert_eq!(bridge.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bypass_respects_preset_cooldown_above_floor() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();

        engine.tick(input(0, 0, t0), &bridge);
        engine.tick(input(700, 700, t0 + Duration::from_millis(100)), &bridge);

        let overlay = TickInput {
            self_overlay: true,
            ..input(0, 0, t0 + Duration::from_millis(500))
        };
        assert_eq!(engine.tick(overlay, &bridge), TickOutcome::CoolingDown);

        let later = TickInput {
            now: t0 + Duration::from_millis(950),
            ..overlay
        };
        assert_eq!(engine.tick(later, &bridge), TickOutcome::Fired { bypass: true });
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_without_prior_trigger_is_not_a_bypass() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let tick = TickInput {
            suppressed: true,
            self_overlay: true,
            ..input(0, 0, Instant::now())
        };
        assert_eq!(engine.tick(tick, &bridge), TickOutcome::Suppressed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_cooldown() {
        let bridge = CountingBridge::default();
        let mut engine = CornerEngine::new();
        let t0 = Instant::now();

        engine.tick(input(0, 0, t0), &bridge);
        engine.reset();
        assert_eq!(engine.state(), EngagementState::NotEngaged);
        assert_eq!(engine.last_trigger(), None);

        assert_eq!(
            engine.tick(input(0, 0, t0 + Duration::from_millis(10)), &bridge),
            TickOutcome::Fired { bypass: false }
        );
    }
}
