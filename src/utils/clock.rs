use std::time::{Duration, Instant};

/// Frame clock of the headless window.
///
/// With a fixed step every tick advances by exactly that amount, which makes
/// runs reproducible. Without one the wall-clock time between ticks is used.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fixed_step: Option<Duration>,
    last_tick: Instant,
    delta: Duration,
    elapsed: Duration,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(None)
    }
}

impl FrameClock {
    #[must_use]
    pub fn new(fixed_step: Option<Duration>) -> Self {
        Self {
            fixed_step,
            last_tick: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// A clock advancing `seconds` per tick. Non-finite or negative steps
    /// fall back to wall-clock time.
    #[must_use]
    pub fn fixed(seconds: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(seconds).ok())
    }

    /// Advances to the next frame and returns its delta in seconds.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        self.delta = self.fixed_step.unwrap_or(now - self.last_tick);
        self.last_tick = now;
        self.elapsed += self.delta;
        self.frame_count += 1;
        self.delta.as_secs_f64()
    }

    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_accumulates_exactly() {
        let mut clock = FrameClock::fixed(0.5);
        assert_eq!(clock.tick(), 0.5);
        assert_eq!(clock.tick(), 0.5);
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn invalid_step_measures_wall_clock() {
        let mut clock = FrameClock::fixed(-1.0);
        let dt = clock.tick();
        assert!(dt >= 0.0 && dt < 1.0);
    }
}
