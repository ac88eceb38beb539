use crate::events::{ForegroundInfo, ForegroundSnapshot};
use tokio::time::{Duration, Instant};

/// Решение о запуске опроса окна переднего плана
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRequest {
    /// Запустить новый STATUS с этим порядковым номером
    Start(u64),
    /// Кэш ещё свежий
    Fresh,
    /// Уже есть запрос в полёте, этот к нему присоединяется
    Coalesced,
}

/// Итог приёма результата опроса
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeAccepted {
    /// Снимок отличается от предыдущего
    pub changed: bool,
    /// Пока запрос был в полёте, пришёл принудительный: нужен ещё один опрос
    pub rerun: bool,
}

/// Кэш снимка окна переднего плана с окном свежести и одним запросом в полёте
///
/// Сам ничего не опрашивает: решает, нужен ли STATUS, и принимает результат.
/// Каждый запрос получает возрастающий номер; снимок с номером не меньше
/// `next_sequence()`, взятого в какой-то момент, заведомо запрошен после него.
#[derive(Debug)]
pub struct ForegroundProbe {
    freshness: Duration,
    snapshot: Option<ForegroundSnapshot>,
    stale: bool,
    in_flight: Option<u64>,
    next_sequence: u64,
    rerun_requested: bool,
}

impl ForegroundProbe {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            snapshot: None,
            stale: true,
            in_flight: None,
            next_sequence: 1,
            rerun_requested: false,
        }
    }

    pub fn request(&mut self, force: bool, now: Instant) -> ProbeRequest {
        if self.in_flight.is_some() {
            if force {
                self.rerun_requested = true;
            }
            return ProbeRequest::Coalesced;
        }

        if !force && self.is_fresh(now) {
            return ProbeRequest::Fresh;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.in_flight = Some(sequence);
        ProbeRequest::Start(sequence)
    }

    fn is_fresh(&self, now: Instant) -> bool {
        match &self.snapshot {
            Some(snapshot) if !self.stale => now.saturating_duration_since(snapshot.observed_at) < self.freshness,
            _ => false,
        }
    }

    /// Номер, который получит следующий запрос
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Принять ответ на запрос `sequence`, выданный в момент `issued_at`
    pub fn accept(&mut self, info: ForegroundInfo, sequence: u64, issued_at: Instant) -> ProbeAccepted {
        if self.in_flight == Some(sequence) {
            self.in_flight = None;
        }

        // Ответ на более старый запрос не затирает более новый снимок
        if self.snapshot.as_ref().is_some_and(|current| current.sequence > sequence) {
            return ProbeAccepted {
                changed: false,
                rerun: self.take_rerun(),
            };
        }

        let changed = self.snapshot.as_ref().map(|s| s.info != info).unwrap_or(true);
        self.snapshot = Some(ForegroundSnapshot {
            info,
            observed_at: issued_at,
            sequence,
        });
        self.stale = false;

        ProbeAccepted {
            changed,
            rerun: self.take_rerun(),
        }
    }

    fn take_rerun(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        std::mem::take(&mut self.rerun_requested)
    }

    /// Следующий запрос пойдёт к воркеру, даже если снимок свежий
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Забыть снимок; ответы на уже выданные запросы будут приняты как обычно
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.stale = true;
        self.rerun_requested = false;
    }

    pub fn snapshot(&self) -> Option<&ForegroundSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn info(&self) -> Option<&ForegroundInfo> {
        self.snapshot.as_ref().map(|s| &s.info)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
