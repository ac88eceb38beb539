use std::fmt;
use std::time::Duration;

/// Пресет скорости детекции: базовый интервал опроса и кулдаун между срабатываниями
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeedPreset {
    pub key: &'static str,
    pub label: &'static str,
    pub poll_interval_ms: u64,
    pub cooldown_ms: u64,
}

impl SpeedPreset {
    pub const INSTANT: SpeedPreset = SpeedPreset::new("instant", "Instant", 0, 0);
    pub const VERY_FAST: SpeedPreset = SpeedPreset::new("very-fast", "Very fast", 25, 650);
    pub const FAST: SpeedPreset = SpeedPreset::new("fast", "Fast", 55, 900);
    pub const MEDIUM: SpeedPreset = SpeedPreset::new("medium", "Medium", 130, 1400);
    pub const SLOW: SpeedPreset = SpeedPreset::new("slow", "Slow", 220, 2000);

    pub const ALL: [SpeedPreset; 5] = [
        Self::INSTANT,
        Self::VERY_FAST,
        Self::FAST,
        Self::MEDIUM,
        Self::SLOW,
    ];

    const fn new(key: &'static str, label: &'static str, poll_interval_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            key,
            label,
            poll_interval_ms,
            cooldown_ms,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key == key.trim())
    }

    /// Нулевой интервал означает «опрашивать так часто, как позволяет цикл»
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for SpeedPreset {
    fn default() -> Self {
        Self::FAST
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}ms / {}ms)", self.key, self.poll_interval_ms, self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_lookup() {
        assert_eq!(SpeedPreset::from_key("fast"), Some(SpeedPreset::FAST));
        assert_eq!(SpeedPreset::from_key("very-fast").unwrap().poll_interval_ms, 25);
        assert_eq!(SpeedPreset::from_key("ludicrous"), None);
        assert_eq!(SpeedPreset::default().key, "fast");
    }

    #[test]
    fn test_instant_has_zero_interval() {
        assert_eq!(SpeedPreset::INSTANT.poll_interval(), Duration::ZERO);
        assert_eq!(SpeedPreset::INSTANT.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_presets_are_ordered_by_interval() {
        let intervals: Vec<u64> = SpeedPreset::ALL.iter().map(|p| p.poll_interval_ms).collect();
        let mut sorted = intervals.clone();
        sorted.sort_unstable();
        assert_eq!(intervals, sorted);
    }
}
