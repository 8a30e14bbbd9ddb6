use crate::clock::{ClockError, FrameClock, TimeSource};
use cubeworld_common::{Config, ConfigError};
use serde::Serialize;

pub const DEFAULT_FIXED_UPDATE_FREQUENCY: f64 = 60.0;
pub const DEFAULT_MAX_TICKS_PER_FRAME: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError<E: std::error::Error + 'static> {
    #[error("frame clock failed: {0}")]
    Clock(#[from] ClockError),
    #[error("frame host failed: {0}")]
    Host(#[source] E),
    #[error("scheduler has already stopped")]
    AlreadyFinished,
}

/// Timing parameters of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Fixed updates per second.
    pub fixed_update_frequency: f64,
    /// Upper bound on fixed updates run in a single iteration.
    pub max_ticks_per_frame: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fixed_update_frequency: DEFAULT_FIXED_UPDATE_FREQUENCY,
            max_ticks_per_frame: DEFAULT_MAX_TICKS_PER_FRAME,
        }
    }
}

impl SchedulerConfig {
    /// Read `Game.FixedUpdateFrequency` and `Game.MaxTicksPerFrame`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let key = "Game.FixedUpdateFrequency";
        let fixed_update_frequency =
            config.get_float_or_default(key, DEFAULT_FIXED_UPDATE_FREQUENCY)?;
        if !(fixed_update_frequency > 0.0 && fixed_update_frequency.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: key.into(),
                value: fixed_update_frequency.to_string(),
                expected: "a positive frequency",
            });
        }

        let key = "Game.MaxTicksPerFrame";
        let max_ticks = config.get_int_or_default(key, DEFAULT_MAX_TICKS_PER_FRAME as i64)?;
        let max_ticks_per_frame = u32::try_from(max_ticks)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.into(),
                value: max_ticks.to_string(),
                expected: "a positive tick count",
            })?;

        Ok(Self {
            fixed_update_frequency,
            max_ticks_per_frame,
        })
    }

    pub fn fixed_period(&self) -> f64 {
        1.0 / self.fixed_update_frequency
    }
}

/// Result of draining the platform event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    Continue,
    /// The window is minimised or the app suspended; time stands still.
    Suspended,
    Quit(i32),
}

/// The application side of the frame loop.
pub trait FrameHost {
    type Error: std::error::Error + 'static;

    /// Drain pending platform events without blocking.
    fn pump_events(&mut self) -> PumpStatus;

    /// One fixed-rate simulation tick of `period` seconds.
    fn fixed_update(&mut self, period: f64) -> Result<(), Self::Error>;

    /// One variable-rate update with the real frame delta.
    fn update(&mut self, delta: f64) -> Result<(), Self::Error>;

    /// Render and present one frame.
    fn render(&mut self, delta: f64) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    NotStarted,
    Running,
    Stopped,
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    Frame { fixed_ticks: u32, clamped: bool },
    Suspended,
    Quit(i32),
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub iterations: u64,
    pub frames: u64,
    pub fixed_ticks: u64,
    pub clamped_frames: u64,
    pub suspended_iterations: u64,
}

/// Fixed-timestep game loop driven by a [`FrameClock`].
///
/// Each frame adds the clock delta to an accumulator, runs fixed updates
/// while the accumulator exceeds one period (at most `max_ticks_per_frame`
/// of them), then runs one variable update and one render. Time left over
/// after hitting the cap is carried into the next frame.
#[derive(Debug)]
pub struct FrameScheduler<S: TimeSource> {
    clock: FrameClock<S>,
    fixed_period: f64,
    max_ticks_per_frame: u32,
    accumulated: f64,
    state: SchedulerState,
    exit_code: Option<i32>,
    stats: SchedulerStats,
}

impl<S: TimeSource> FrameScheduler<S> {
    pub fn new(clock: FrameClock<S>, config: SchedulerConfig) -> Self {
        Self {
            clock,
            fixed_period: config.fixed_period(),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulated: 0.0,
            state: SchedulerState::NotStarted,
            exit_code: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    pub fn fixed_period(&self) -> f64 {
        self.fixed_period
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn clock(&self) -> &FrameClock<S> {
        &self.clock
    }

    /// Advance by an explicit delta: fixed ticks, one update, one render.
    pub fn step<H: FrameHost>(
        &mut self,
        delta: f64,
        host: &mut H,
    ) -> Result<Iteration, SchedulerError<H::Error>> {
        self.accumulated += delta.max(0.0);

        let mut ticks = 0;
        while self.accumulated > self.fixed_period && ticks < self.max_ticks_per_frame {
            self.accumulated -= self.fixed_period;
            self.fail_on_error(host.fixed_update(self.fixed_period))?;
            ticks += 1;
        }
        let clamped = self.accumulated > self.fixed_period;
        if clamped {
            self.stats.clamped_frames += 1;
            tracing::debug!(
                backlog = self.accumulated,
                ticks,
                "fixed update cap reached, carrying backlog"
            );
        }

        self.fail_on_error(host.update(delta))?;
        self.fail_on_error(host.render(delta))?;

        self.stats.frames += 1;
        self.stats.fixed_ticks += u64::from(ticks);
        Ok(Iteration::Frame {
            fixed_ticks: ticks,
            clamped,
        })
    }

    /// One pass of the loop: pump events, tick the clock, step.
    pub fn run_iteration<H: FrameHost>(
        &mut self,
        host: &mut H,
    ) -> Result<Iteration, SchedulerError<H::Error>> {
        match self.state {
            SchedulerState::Stopped => return Err(SchedulerError::AlreadyFinished),
            SchedulerState::NotStarted => {
                self.clock_call(|clock| clock.reset())?;
                self.clock_call(|clock| clock.start())?;
                self.state = SchedulerState::Running;
                tracing::info!(
                    fixed_period = self.fixed_period,
                    max_ticks_per_frame = self.max_ticks_per_frame,
                    "frame loop started"
                );
            }
            SchedulerState::Running => {}
        }

        let _span = tracing::trace_span!("frame", n = self.stats.iterations).entered();
        self.stats.iterations += 1;

        match host.pump_events() {
            PumpStatus::Quit(code) => {
                self.state = SchedulerState::Stopped;
                self.exit_code = Some(code);
                tracing::info!(code, "frame loop stopped");
                return Ok(Iteration::Quit(code));
            }
            PumpStatus::Suspended => {
                if self.clock.is_running() {
                    self.clock_call(|clock| clock.stop())?;
                    tracing::debug!("frame clock paused");
                }
                self.stats.suspended_iterations += 1;
                return Ok(Iteration::Suspended);
            }
            PumpStatus::Continue => {
                if !self.clock.is_running() {
                    self.clock_call(|clock| clock.start())?;
                    tracing::debug!("frame clock resumed");
                }
            }
        }

        self.clock_call(|clock| clock.tick())?;
        let delta = self.clock.delta_time();
        self.step(delta, host)
    }

    /// Loop until the host asks to quit; returns its exit code.
    pub fn run<H: FrameHost>(&mut self, host: &mut H) -> Result<i32, SchedulerError<H::Error>> {
        loop {
            if let Iteration::Quit(code) = self.run_iteration(host)? {
                return Ok(code);
            }
        }
    }

    fn clock_call(
        &mut self,
        f: impl FnOnce(&mut FrameClock<S>) -> Result<(), ClockError>,
    ) -> Result<(), ClockError> {
        f(&mut self.clock).inspect_err(|_| self.state = SchedulerState::Stopped)
    }

    fn fail_on_error<E: std::error::Error + 'static>(
        &mut self,
        result: Result<(), E>,
    ) -> Result<(), SchedulerError<E>> {
        result.map_err(|e| {
            self.state = SchedulerState::Stopped;
            SchedulerError::Host(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeSource;
    use std::collections::VecDeque;

    #[derive(Debug, thiserror::Error)]
    #[error("render failed")]
    struct RenderFailed;

    #[derive(Default)]
    struct RecordingHost {
        pumps: VecDeque<PumpStatus>,
        calls: Vec<String>,
        fail_render: bool,
    }

    impl FrameHost for RecordingHost {
        type Error = RenderFailed;

        fn pump_events(&mut self) -> PumpStatus {
            self.pumps.pop_front().unwrap_or(PumpStatus::Quit(0))
        }

        fn fixed_update(&mut self, _period: f64) -> Result<(), RenderFailed> {
            self.calls.push("fixed".into());
            Ok(())
        }

        fn update(&mut self, _delta: f64) -> Result<(), RenderFailed> {
            self.calls.push("update".into());
            Ok(())
        }

        fn render(&mut self, _delta: f64) -> Result<(), RenderFailed> {
            if self.fail_render {
                return Err(RenderFailed);
            }
            self.calls.push("render".into());
            Ok(())
        }
    }

    fn scheduler(max_ticks: u32) -> (ManualTimeSource, FrameScheduler<ManualTimeSource>) {
        let source = ManualTimeSource::new();
        let clock = FrameClock::new(source.clone()).unwrap();
        let config = SchedulerConfig {
            fixed_update_frequency: 60.0,
            max_ticks_per_frame: max_ticks,
        };
        (source, FrameScheduler::new(clock, config))
    }

    #[test]
    fn long_frame_is_clamped_and_backlog_carried() {
        let (_, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        let it = sched.step(1.0, &mut host).unwrap();
        assert_eq!(
            it,
            Iteration::Frame {
                fixed_ticks: 5,
                clamped: true
            }
        );
        assert!((sched.accumulated() - (1.0 - 5.0 / 60.0)).abs() < 1e-9);
        assert!((sched.accumulated() - 0.9167).abs() < 1e-4);
        let fixed = host.calls.iter().filter(|c| *c == "fixed").count();
        assert_eq!(fixed, 5);
    }

    #[test]
    fn fixed_ticks_run_before_update_and_render() {
        let (_, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        sched.step(2.5 / 60.0, &mut host).unwrap();
        assert_eq!(host.calls, vec!["fixed", "fixed", "update", "render"]);
        assert!(sched.accumulated() < sched.fixed_period());
        assert!(sched.accumulated() >= 0.0);
    }

    #[test]
    fn exactly_one_period_does_not_tick() {
        let (_, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        let it = sched.step(sched.fixed_period(), &mut host).unwrap();
        assert_eq!(
            it,
            Iteration::Frame {
                fixed_ticks: 0,
                clamped: false
            }
        );
    }

    #[test]
    fn quit_stops_the_loop() {
        let (source, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        host.pumps = VecDeque::from([PumpStatus::Continue, PumpStatus::Continue]);
        source.advance_secs(0.5);
        let code = sched.run(&mut host).unwrap();
        assert_eq!(code, 0);
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert_eq!(sched.stats().frames, 2);
        assert!(matches!(
            sched.run_iteration(&mut host),
            Err(SchedulerError::AlreadyFinished)
        ));
    }

    #[test]
    fn quit_code_is_returned() {
        let (_, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        host.pumps = VecDeque::from([PumpStatus::Quit(3)]);
        assert_eq!(sched.run(&mut host).unwrap(), 3);
        assert!(host.calls.is_empty());
        assert_eq!(sched.exit_code(), Some(3));
    }

    #[test]
    fn suspension_pauses_time() {
        let (source, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        host.pumps = VecDeque::from([
            PumpStatus::Continue,
            PumpStatus::Suspended,
            PumpStatus::Continue,
        ]);
        sched.run_iteration(&mut host).unwrap();
        assert_eq!(sched.run_iteration(&mut host).unwrap(), Iteration::Suspended);
        assert!(!sched.clock().is_running());
        source.advance_secs(30.0);
        let it = sched.run_iteration(&mut host).unwrap();
        assert_eq!(
            it,
            Iteration::Frame {
                fixed_ticks: 0,
                clamped: false
            }
        );
        assert_eq!(sched.clock().total_time(), 0.0);
    }

    #[test]
    fn clock_failure_is_fatal() {
        let (source, mut sched) = scheduler(5);
        let mut host = RecordingHost::default();
        host.pumps = VecDeque::from([PumpStatus::Continue, PumpStatus::Continue]);
        sched.run_iteration(&mut host).unwrap();
        source.set_available(false);
        assert!(matches!(
            sched.run_iteration(&mut host),
            Err(SchedulerError::Clock(_))
        ));
        assert_eq!(sched.state(), SchedulerState::Stopped);
    }

    #[test]
    fn host_failure_is_fatal() {
        let (_, mut sched) = scheduler(5);
        let mut host = RecordingHost {
            fail_render: true,
            pumps: VecDeque::from([PumpStatus::Continue]),
            ..Default::default()
        };
        assert!(matches!(
            sched.run(&mut host),
            Err(SchedulerError::Host(RenderFailed))
        ));
        assert_eq!(sched.state(), SchedulerState::Stopped);
    }

    #[test]
    fn config_reads_keys_and_defaults() {
        let cfg = Config::parse("Game.FixedUpdateFrequency 30\n");
        let sc = SchedulerConfig::from_config(&cfg).unwrap();
        assert_eq!(sc.fixed_update_frequency, 30.0);
        assert_eq!(sc.max_ticks_per_frame, 5);

        let bad = Config::parse("Game.MaxTicksPerFrame 0\n");
        assert!(SchedulerConfig::from_config(&bad).is_err());
        let bad = Config::parse("Game.FixedUpdateFrequency -1\n");
        assert!(SchedulerConfig::from_config(&bad).is_err());
    }
}
