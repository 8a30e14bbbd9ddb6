//! Frame loop against the headless backend, with a manual clock.

use cubeworld_common::Extent2D;
use cubeworld_kernel::{
    FrameClock, FrameHost, FrameScheduler, ManualTimeSource, PumpStatus, SchedulerConfig,
    SchedulerError, SchedulerStats,
};
use cubeworld_render::{
    BackendError, DeviceLifecycle, DrawList, FrameAcquire, HeadlessBackend, HeadlessCapabilities,
    Op, PresentOutcome, RenderError, RendererOptions, Scene,
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub frames: u64,
    /// Wall-clock seconds between frames.
    pub delta: f64,
    /// Frame indices whose present reports a removed device.
    pub lose_device_at: BTreeSet<u64>,
    pub size: Extent2D,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub frames_rendered: u64,
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub recoveries: u64,
    pub device_generation: u64,
    pub scheduler: SchedulerStats,
    pub scene_ticks: u64,
    pub scene_time: f64,
    pub backend_calls: usize,
    pub exit_code: i32,
    #[serde(skip)]
    pub last_frame: String,
}

struct Simulation {
    params: SimulationParams,
    time: ManualTimeSource,
    lifecycle: DeviceLifecycle<HeadlessBackend>,
    scene: Scene,
    draw_list: DrawList,
    rendered: u64,
    presented: u64,
    skipped: u64,
}

impl FrameHost for Simulation {
    type Error = RenderError;

    fn pump_events(&mut self) -> PumpStatus {
        if self.rendered >= self.params.frames {
            return PumpStatus::Quit(0);
        }
        self.time.advance_secs(self.params.delta);
        PumpStatus::Continue
    }

    fn fixed_update(&mut self, period: f64) -> Result<(), RenderError> {
        self.scene.fixed_update(period);
        Ok(())
    }

    fn update(&mut self, delta: f64) -> Result<(), RenderError> {
        self.scene.update(delta);
        Ok(())
    }

    fn render(&mut self, _delta: f64) -> Result<(), RenderError> {
        let index = self.rendered;
        self.rendered += 1;

        let frame = match self.lifecycle.acquire_frame()? {
            FrameAcquire::Ready(frame) => frame,
            FrameAcquire::Skipped(reason) => {
                tracing::warn!(index, ?reason, "frame skipped");
                self.skipped += 1;
                return Ok(());
            }
        };
        self.draw_list.clear();
        let Ok(()) = self.scene.render(&mut self.draw_list);
        let Ok(()) = self.scene.post_process(&mut self.draw_list);

        if self.params.lose_device_at.contains(&index) {
            tracing::info!(index, "injecting device removal at present");
            self.lifecycle.backend_mut().inject(
                Op::Present,
                BackendError::DeviceRemoved("simulated device removal".into()),
            );
        }
        match self.lifecycle.present(frame)? {
            PresentOutcome::Presented => self.presented += 1,
            PresentOutcome::Recovered => {
                tracing::info!(index, generation = self.lifecycle.generation(), "recovered");
            }
        }
        Ok(())
    }
}

/// Run `params.frames` frames of the scene through the real scheduler and
/// device lifecycle.
pub fn run(
    params: SimulationParams,
    options: RendererOptions,
    scheduler_config: SchedulerConfig,
    scene: Scene,
) -> Result<SimulationSummary, SchedulerError<RenderError>> {
    let time = ManualTimeSource::new();
    let clock = FrameClock::new(time.clone())?;
    let lifecycle =
        DeviceLifecycle::create(HeadlessBackend::new(HeadlessCapabilities::default()), options, params.size)
            .map_err(SchedulerError::Host)?;
    let journal = lifecycle.backend().journal();

    let mut sim = Simulation {
        params,
        time,
        lifecycle,
        scene,
        draw_list: DrawList::new(),
        rendered: 0,
        presented: 0,
        skipped: 0,
    };
    let mut scheduler = FrameScheduler::new(clock, scheduler_config);
    let exit_code = scheduler.run(&mut sim)?;

    Ok(SimulationSummary {
        frames_rendered: sim.rendered,
        frames_presented: sim.presented,
        frames_skipped: sim.skipped,
        recoveries: sim.lifecycle.recoveries(),
        device_generation: sim.lifecycle.generation(),
        scheduler: scheduler.stats(),
        scene_ticks: sim.scene.fixed_ticks(),
        scene_time: sim.scene.elapsed(),
        backend_calls: journal.entries().len(),
        exit_code,
        last_frame: sim.draw_list.to_text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(frames: u64, losses: &[u64]) -> SimulationParams {
        SimulationParams {
            frames,
            delta: 1.0 / 60.0,
            lose_device_at: losses.iter().copied().collect(),
            size: Extent2D::new(320, 240),
        }
    }

    fn scene() -> Scene {
        let mut scene = Scene::default();
        scene.init(None);
        scene
    }

    #[test]
    fn runs_requested_frames() {
        let summary = run(
            params(30, &[]),
            RendererOptions::default(),
            SchedulerConfig::default(),
            scene(),
        )
        .unwrap();
        assert_eq!(summary.exit_code, 0);
        assert_eq!(summary.frames_rendered, 30);
        assert_eq!(summary.frames_presented, 30);
        assert_eq!(summary.recoveries, 0);
        assert_eq!(summary.device_generation, 1);
        assert!(summary.last_frame.contains("post-process"));
    }

    #[test]
    fn injected_losses_recover() {
        let summary = run(
            params(20, &[3, 10]),
            RendererOptions::default(),
            SchedulerConfig::default(),
            scene(),
        )
        .unwrap();
        assert_eq!(summary.recoveries, 2);
        assert_eq!(summary.device_generation, 3);
        assert_eq!(summary.frames_presented, 18);
    }

    #[test]
    fn fixed_ticks_follow_elapsed_time() {
        // 30 fps frames against a 60 Hz fixed step: two ticks per frame.
        let mut p = params(10, &[]);
        p.delta = 1.0 / 30.0;
        let summary = run(p, RendererOptions::default(), SchedulerConfig::default(), scene()).unwrap();
        let ticks = summary.scene_ticks;
        assert!((18..=20).contains(&ticks), "ticks = {ticks}");
        assert_eq!(summary.scheduler.fixed_ticks, ticks);
    }
}
