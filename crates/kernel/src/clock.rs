use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("time source unavailable: {0}")]
    TimeSourceUnavailable(String),
}

/// A monotonic counter with a fixed tick rate.
pub trait TimeSource {
    fn now_ticks(&self) -> Result<u64, ClockError>;
    fn ticks_per_second(&self) -> u64;
}

/// Nanosecond ticks measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now_ticks(&self) -> Result<u64, ClockError> {
        u64::try_from(self.origin.elapsed().as_nanos())
            .map_err(|_| ClockError::TimeSourceUnavailable("monotonic counter overflow".into()))
    }

    fn ticks_per_second(&self) -> u64 {
        1_000_000_000
    }
}

/// Hand-driven time source for tests and headless simulation.
///
/// Clones share the same counter, so a test can keep one handle while the
/// clock owns another.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    ticks: Arc<AtomicU64>,
    available: Arc<AtomicBool>,
    ticks_per_second: u64,
}

impl ManualTimeSource {
    /// Microsecond resolution.
    pub fn new() -> Self {
        Self::with_rate(1_000_000)
    }

    pub fn with_rate(ticks_per_second: u64) -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(0)),
            available: Arc::new(AtomicBool::new(true)),
            ticks_per_second,
        }
    }

    pub fn advance(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, seconds: f64) {
        self.advance((seconds * self.ticks_per_second as f64).round() as u64);
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ticks(&self) -> Result<u64, ClockError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ClockError::TimeSourceUnavailable(
                "manual time source disabled".into(),
            ));
        }
        Ok(self.ticks.load(Ordering::SeqCst))
    }

    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }
}

/// Pausable stopwatch producing per-frame delta and total running time.
///
/// Delta time is zero while stopped and total time excludes every stopped
/// interval. A new clock starts stopped; call [`FrameClock::start`].
#[derive(Debug)]
pub struct FrameClock<S: TimeSource = MonotonicTimeSource> {
    source: S,
    seconds_per_tick: f64,
    base_ticks: u64,
    paused_ticks: u64,
    stop_ticks: u64,
    prev_ticks: u64,
    curr_ticks: u64,
    delta: f64,
    stopped: bool,
}

impl FrameClock<MonotonicTimeSource> {
    pub fn monotonic() -> Result<Self, ClockError> {
        Self::new(MonotonicTimeSource::new())
    }
}

impl<S: TimeSource> FrameClock<S> {
    /// Reads the tick rate once; it never changes afterwards.
    pub fn new(source: S) -> Result<Self, ClockError> {
        let rate = source.ticks_per_second();
        if rate == 0 {
            return Err(ClockError::TimeSourceUnavailable(
                "time source reports zero ticks per second".into(),
            ));
        }
        let now = source.now_ticks()?;
        Ok(Self {
            source,
            seconds_per_tick: 1.0 / rate as f64,
            base_ticks: now,
            paused_ticks: 0,
            stop_ticks: now,
            prev_ticks: now,
            curr_ticks: now,
            delta: 0.0,
            stopped: true,
        })
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resume measuring. Does nothing if already running.
    pub fn start(&mut self) -> Result<(), ClockError> {
        if !self.stopped {
            return Ok(());
        }
        let now = self.source.now_ticks()?;
        self.paused_ticks += now.saturating_sub(self.stop_ticks);
        self.prev_ticks = now;
        self.curr_ticks = now;
        self.stopped = false;
        Ok(())
    }

    /// Pause measuring. Does nothing if already stopped.
    pub fn stop(&mut self) -> Result<(), ClockError> {
        if self.stopped {
            return Ok(());
        }
        let now = self.source.now_ticks()?;
        self.stop_ticks = now;
        self.curr_ticks = now;
        self.delta = 0.0;
        self.stopped = true;
        Ok(())
    }

    /// Sample the time source and compute the delta since the previous tick.
    pub fn tick(&mut self) -> Result<(), ClockError> {
        if self.stopped {
            self.delta = 0.0;
            return Ok(());
        }
        let now = self.source.now_ticks()?;
        self.curr_ticks = now;
        self.delta = now.saturating_sub(self.prev_ticks) as f64 * self.seconds_per_tick;
        self.prev_ticks = now;
        Ok(())
    }

    /// Restart measurement at the current instant. Running state is kept.
    pub fn reset(&mut self) -> Result<(), ClockError> {
        let now = self.source.now_ticks()?;
        self.base_ticks = now;
        self.paused_ticks = 0;
        self.stop_ticks = now;
        self.prev_ticks = now;
        self.curr_ticks = now;
        self.delta = 0.0;
        Ok(())
    }

    /// Seconds between the last two ticks; zero while stopped.
    pub fn delta_time(&self) -> f64 {
        if self.stopped { 0.0 } else { self.delta }
    }

    /// Seconds of running time since the last reset, as of the last tick or stop.
    pub fn total_time(&self) -> f64 {
        let end = if self.stopped {
            self.stop_ticks
        } else {
            self.curr_ticks
        };
        end.saturating_sub(self.paused_ticks)
            .saturating_sub(self.base_ticks) as f64
            * self.seconds_per_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn running_clock() -> (ManualTimeSource, FrameClock<ManualTimeSource>) {
        let source = ManualTimeSource::new();
        let mut clock = FrameClock::new(source.clone()).unwrap();
        clock.start().unwrap();
        (source, clock)
    }

    #[test]
    fn new_clock_is_stopped() {
        let clock = FrameClock::new(ManualTimeSource::new()).unwrap();
        assert!(!clock.is_running());
        assert_eq!(clock.delta_time(), 0.0);
        assert_eq!(clock.total_time(), 0.0);
    }

    #[test]
    fn tick_measures_delta() {
        let (source, mut clock) = running_clock();
        source.advance_secs(0.25);
        clock.tick().unwrap();
        assert!(approx(clock.delta_time(), 0.25));
        source.advance_secs(0.5);
        clock.tick().unwrap();
        assert!(approx(clock.delta_time(), 0.5));
        assert!(approx(clock.total_time(), 0.75));
    }

    #[test]
    fn delta_is_zero_while_stopped() {
        let (source, mut clock) = running_clock();
        source.advance_secs(0.1);
        clock.tick().unwrap();
        clock.stop().unwrap();
        assert_eq!(clock.delta_time(), 0.0);
        source.advance_secs(3.0);
        clock.tick().unwrap();
        assert_eq!(clock.delta_time(), 0.0);
    }

    #[test]
    fn total_time_excludes_stopped_interval() {
        let (source, mut clock) = running_clock();
        source.advance_secs(1.0);
        clock.tick().unwrap();
        clock.stop().unwrap();
        source.advance_secs(10.0);
        assert!(approx(clock.total_time(), 1.0));
        clock.start().unwrap();
        source.advance_secs(0.5);
        clock.tick().unwrap();
        assert!(approx(clock.delta_time(), 0.5));
        assert!(approx(clock.total_time(), 1.5));
    }

    #[test]
    fn start_is_idempotent() {
        let (source, mut clock) = running_clock();
        source.advance_secs(0.2);
        clock.start().unwrap();
        clock.tick().unwrap();
        assert!(approx(clock.delta_time(), 0.2));
    }

    #[test]
    fn reset_keeps_running_state() {
        let (source, mut clock) = running_clock();
        source.advance_secs(4.0);
        clock.tick().unwrap();
        clock.reset().unwrap();
        assert!(clock.is_running());
        assert_eq!(clock.total_time(), 0.0);
        source.advance_secs(0.1);
        clock.tick().unwrap();
        assert!(approx(clock.delta_time(), 0.1));
        assert!(approx(clock.total_time(), 0.1));
    }

    #[test]
    fn unavailable_source_fails_tick() {
        let (source, mut clock) = running_clock();
        source.set_available(false);
        assert!(matches!(
            clock.tick(),
            Err(ClockError::TimeSourceUnavailable(_))
        ));
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(FrameClock::new(ManualTimeSource::with_rate(0)).is_err());
    }

    #[test]
    fn monotonic_clock_advances() {
        let mut clock = FrameClock::monotonic().unwrap();
        clock.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        clock.tick().unwrap();
        assert!(clock.delta_time() > 0.0);
    }
}
