use crate::events::CursorPoint;
use crate::services::corner_engine::CornerEngine;
use tokio::time::{Duration, Instant};

/// Минимальная задержка между тиками опроса
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(8);

/// Верхняя граница задержки при неподвижном курсоре
pub const IDLE_POLL_MAX_DELAY: Duration = Duration::from_millis(450);

const INSTANT_IDLE_STREAK_CAP: u32 = 10;
const INSTANT_IDLE_STEP: Duration = Duration::from_millis(15);
const IDLE_STREAK_CAP: u32 = 8;
const IDLE_STEP: Duration = Duration::from_millis(40);

/// Самоперепланирующийся таймер опроса курсора
///
/// Таймер не крутится сам: цикл сервиса ждёт `deadline()`, выполняет тик и
/// вызывает `schedule(next_delay(..))`.
#[derive(Debug, Default)]
pub struct PollScheduler {
    active: bool,
    idle_streak: u32,
    last_point: Option<CursorPoint>,
    deadline: Option<Instant>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn idle_streak(&self) -> u32 {
        self.idle_streak
    }

    /// Сбросить счётчики и сразу назначить тик
    pub fn start(&mut self, now: Instant) {
        self.active = true;
        self.idle_streak = 0;
        self.last_point = None;
        self.deadline = Some(now);
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.deadline = None;
    }

    /// Перезапуск при смене пресета: вместе с ним сбрасываются кулдаун и вовлечённость
    pub fn restart(&mut self, engine: &mut CornerEngine, now: Instant) {
        self.stop();
        engine.reset();
        self.start(now);
    }

    /// Момент следующего тика; `None` если опрос остановлен
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.filter(|_| self.active)
    }

    /// Тик наступил: таймер израсходован до следующего `schedule`
    pub fn fire(&mut self) -> bool {
        self.deadline = None;
        self.active
    }

    pub fn schedule(&mut self, delay: Duration, now: Instant) {
        if !self.active {
            return;
        }
        self.deadline = Some(now + delay.clamp(MIN_POLL_DELAY, IDLE_POLL_MAX_DELAY));
    }

    /// Задержка до следующего тика по положению курсора и базовому интервалу пресета
    pub fn next_delay(&mut self, point: CursorPoint, base: Duration, near_corner: bool) -> Duration {
        let moved = self.last_point != Some(point);
        self.last_point = Some(point);

        let mut delay = if base.is_zero() {
            if moved {
                self.idle_streak = 0;
                MIN_POLL_DELAY
            } else {
                self.idle_streak = (self.idle_streak + 1).min(INSTANT_IDLE_STREAK_CAP);
                (MIN_POLL_DELAY + INSTANT_IDLE_STEP * self.idle_streak).min(IDLE_POLL_MAX_DELAY)
            }
        } else if moved {
            self.idle_streak = 0;
            base.max(MIN_POLL_DELAY)
        } else {
            self.idle_streak = (self.idle_streak + 1).min(IDLE_STREAK_CAP);
            (base + IDLE_STEP * self.idle_streak).min(IDLE_POLL_MAX_DELAY)
        };

        if near_corner {
            let aggressive = if base.is_zero() {
                MIN_POLL_DELAY
            } else {
                Duration::from_millis((base.as_millis() / 2) as u64).max(MIN_POLL_DELAY)
            };
            delay = delay.min(aggressive);
        }

        delay.clamp(MIN_POLL_DELAY, IDLE_POLL_MAX_DELAY)
    }
}
