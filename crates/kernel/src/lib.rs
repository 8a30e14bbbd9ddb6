//! Frame timing and scheduling: the pausable frame clock, the fixed-timestep
//! game loop and a small background worker pool.
//!
//! # Invariants
//! - Delta time is zero while the clock is stopped.
//! - The scheduler's accumulator never goes negative; at most
//!   `max_ticks_per_frame` fixed updates run per iteration.
//! - Fixed updates of an iteration all run before its single render.

pub mod clock;
pub mod jobs;
pub mod scheduler;

pub use clock::{ClockError, FrameClock, ManualTimeSource, MonotonicTimeSource, TimeSource};
pub use jobs::{Job, WorkDispatcher};
pub use scheduler::{
    FrameHost, FrameScheduler, Iteration, PumpStatus, SchedulerConfig, SchedulerError,
    SchedulerState, SchedulerStats,
};

pub fn crate_info() -> &'static str {
    "cubeworld-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
