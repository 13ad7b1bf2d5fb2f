use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Source of wall-clock deltas for the loop.
pub trait Clock {
    /// Time elapsed since the previous call (or since construction/reset).
    fn tick(&mut self) -> Duration;

    /// Restarts the measurement baseline.
    fn reset(&mut self) {}
}

/// Monotonic clock on [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last);
        self.last = now;
        dt
    }

    /// Useful after a long blocking call such as device creation.
    fn reset(&mut self) {
        self.last = Instant::now();
    }
}

/// Clock replaying scripted deltas; returns `idle` once the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    script: VecDeque<Duration>,
    idle: Duration,
}

impl ManualClock {
    pub fn new(script: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            script: script.into_iter().collect(),
            idle: Duration::ZERO,
        }
    }

    /// Delta returned after the script is exhausted.
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn push(&mut self, dt: Duration) {
        self.script.push_back(dt);
    }
}

impl Clock for ManualClock {
    fn tick(&mut self) -> Duration {
        self.script.pop_front().unwrap_or(self.idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_replays_then_idles() {
        let mut clock =
            ManualClock::new([Duration::from_millis(5)]).with_idle(Duration::from_millis(1));
        assert_eq!(clock.tick(), Duration::from_millis(5));
        assert_eq!(clock.tick(), Duration::from_millis(1));
        clock.push(Duration::from_millis(7));
        assert_eq!(clock.tick(), Duration::from_millis(7));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(a < Duration::from_secs(1));
        assert!(b < Duration::from_secs(1));
    }
}
