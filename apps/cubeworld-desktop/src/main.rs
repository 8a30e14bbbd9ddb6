mod input;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cubeworld_common::{Config, Extent2D};
use cubeworld_kernel::{
    FrameClock, FrameHost, FrameScheduler, PumpStatus, SchedulerConfig, WorkDispatcher,
};
use cubeworld_render::{
    CameraSettings, DeviceLifecycle, FrameAcquire, PresentOutcome, RenderError, RendererOptions,
    Scene, VoxelWorld, WorldLoadError,
};
use cubeworld_render_wgpu::{GpuError, WgpuBackend, WgpuRenderer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus as WinitPump};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "cubeworld-desktop", about = "Cube world desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (`key value` lines)
    #[arg(short, long, default_value = "cubeworld.cfg")]
    config: PathBuf,
}

/// Collects window events between frames.
struct WindowEvents {
    size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    create_error: Option<String>,
    keys_held: HashSet<KeyCode>,
    pending_resize: Option<PhysicalSize<u32>>,
    minimized: bool,
    suspended: bool,
    quit: bool,
}

impl WindowEvents {
    fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            window: None,
            create_error: None,
            keys_held: HashSet::new(),
            pending_resize: None,
            minimized: false,
            suspended: false,
            quit: false,
        }
    }

    fn idle(&self) -> bool {
        self.minimized || self.suspended
    }
}

impl ApplicationHandler for WindowEvents {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.suspended = false;
        if self.window.is_some() {
            tracing::debug!("resumed");
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("Cube World")
            .with_inner_size(self.size);
        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        tracing::debug!("suspended");
        self.suspended = true;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.quit = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // Minimising reports a zero client area.
                self.minimized = size.width == 0 || size.height == 0;
                if !self.minimized {
                    self.pending_resize = Some(size);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        ..
                    },
                ..
            } => {
                if state == ElementState::Pressed {
                    if key == KeyCode::Escape {
                        self.quit = true;
                        event_loop.exit();
                    }
                    self.keys_held.insert(key);
                } else {
                    self.keys_held.remove(&key);
                }
            }
            WindowEvent::Focused(false) => self.keys_held.clear(),
            _ => {}
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum DesktopError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Owns the window, the device lifecycle and the scene for the frame loop.
struct Desktop {
    event_loop: EventLoop<()>,
    events: WindowEvents,
    scene: Scene,
    // Dropped before the lifecycle that owns the device.
    renderer: Option<WgpuRenderer>,
    lifecycle: DeviceLifecycle<WgpuBackend<Window>>,
}

impl Desktop {
    fn apply_resize(&mut self) -> Result<(), DesktopError> {
        let Some(size) = self.events.pending_resize.take() else {
            return Ok(());
        };
        if self
            .lifecycle
            .on_size_changed(Extent2D::new(size.width, size.height))?
        {
            self.scene.on_screen_size_change(size.width, size.height);
            tracing::debug!(width = size.width, height = size.height, "resized");
        }
        Ok(())
    }
}

impl FrameHost for Desktop {
    type Error = DesktopError;

    fn pump_events(&mut self) -> PumpStatus {
        let timeout = if self.events.idle() {
            Duration::from_millis(50)
        } else {
            Duration::ZERO
        };
        if let WinitPump::Exit(code) = self.event_loop.pump_app_events(Some(timeout), &mut self.events) {
            return PumpStatus::Quit(code);
        }
        if self.events.quit {
            PumpStatus::Quit(0)
        } else if self.events.idle() {
            PumpStatus::Suspended
        } else {
            PumpStatus::Continue
        }
    }

    fn fixed_update(&mut self, period: f64) -> Result<(), DesktopError> {
        self.scene.fixed_update(period);
        Ok(())
    }

    fn update(&mut self, delta: f64) -> Result<(), DesktopError> {
        self.apply_resize()?;
        self.scene
            .set_camera_input(input::camera_input(&self.events.keys_held));
        self.scene.update(delta);
        Ok(())
    }

    fn render(&mut self, _delta: f64) -> Result<(), DesktopError> {
        let frame = match self.lifecycle.acquire_frame()? {
            FrameAcquire::Ready(frame) => frame,
            FrameAcquire::Skipped(reason) => {
                tracing::debug!(?reason, "frame skipped");
                return Ok(());
            }
        };
        let generation = self.lifecycle.generation();
        let (Some(device), Some(color)) = (self.lifecycle.device(), self.lifecycle.color_target())
        else {
            return Ok(());
        };
        let depth = self.lifecycle.depth_target();
        let depth_format = depth.map(|d| d.format);

        let stale = self
            .renderer
            .as_ref()
            .is_none_or(|r| r.generation() != generation || !r.matches(color.format, depth_format));
        if stale {
            self.renderer = None;
            self.renderer = Some(WgpuRenderer::new(device, generation, color.format, depth_format)?);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut gpu_frame = renderer.frame(device, generation, color, depth, &view)?;
        self.scene.render(&mut gpu_frame)?;
        self.scene.post_process(&mut gpu_frame)?;
        gpu_frame.submit();
        drop(view);

        if self.lifecycle.present(frame)? == PresentOutcome::Recovered {
            tracing::info!(
                generation = self.lifecycle.generation(),
                "device recovered, gpu resources will be rebuilt"
            );
        }
        Ok(())
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config = Config::load(path).with_context(|| format!("reading {}", path.display()))?;
        tracing::info!(path = %path.display(), keys = config.len(), "configuration loaded");
        Ok(config)
    } else {
        tracing::warn!(path = %path.display(), "configuration file not found, using defaults");
        Ok(Config::new())
    }
}

fn window_size(config: &Config) -> Result<PhysicalSize<u32>> {
    let dim = |key: &str, default: i64| -> Result<u32> {
        let value = config.get_int_or_default(key, default)?;
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .with_context(|| format!("{key} must be a positive pixel count, got {value}"))
    };
    Ok(PhysicalSize::new(
        dim("MainWindow.Width", 800)?,
        dim("MainWindow.Height", 600)?,
    ))
}

type WorldResult = Result<VoxelWorld, WorldLoadError>;

/// Load the world and hand it to the waiting viewer. Returns `false` when
/// nobody is waiting any more.
fn send_world(tx: &mpsc::Sender<WorldResult>, config: &Config) -> bool {
    let delivered = tx.send(VoxelWorld::from_config(config)).is_ok();
    if !delivered {
        tracing::debug!("world loaded after the viewer stopped waiting, discarded");
    }
    delivered
}

fn run(cli: &Cli) -> Result<i32> {
    let config = load_config(&cli.config)?;
    let scheduler_config = SchedulerConfig::from_config(&config)?;
    let options = RendererOptions::from_config(&config)?;
    let mut scene = Scene::new(CameraSettings::from_config(&config)?);

    // Load and mesh the world while the window and device come up.
    let loader = WorkDispatcher::new("world-loader", 1).context("starting world loader")?;
    let (world_tx, world_rx) = mpsc::channel();
    let world_config = config.clone();
    loader.dispatch(move || {
        send_world(&world_tx, &world_config);
    });

    let mut event_loop = EventLoop::new().context("creating event loop")?;
    let mut events = WindowEvents::new(window_size(&config)?);
    while events.window.is_none() {
        if let WinitPump::Exit(code) =
            event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut events)
        {
            if let Some(e) = events.create_error.take() {
                bail!("creating window: {e}");
            }
            return Ok(code);
        }
    }
    let Some(window) = events.window.clone() else {
        bail!("window was not created");
    };

    let size = window.inner_size();
    let lifecycle = DeviceLifecycle::create(
        WgpuBackend::new(Arc::clone(&window)),
        options,
        Extent2D::new(size.width, size.height),
    )
    .context("creating graphics device")?;
    let world = world_rx
        .recv()
        .context("world loader stopped")?
        .context("loading voxel world")?;
    drop(loader);
    scene.init(Some(world));
    scene.on_screen_size_change(size.width, size.height);
    tracing::info!(
        width = size.width,
        height = size.height,
        feature_level = ?lifecycle.feature_level(),
        "renderer ready"
    );

    let mut desktop = Desktop {
        event_loop,
        events,
        scene,
        renderer: None,
        lifecycle,
    };
    let mut scheduler = FrameScheduler::new(FrameClock::monotonic()?, scheduler_config);
    let result = scheduler.run(&mut desktop);

    let stats = scheduler.stats();
    tracing::info!(
        frames = stats.frames,
        fixed_ticks = stats.fixed_ticks,
        recoveries = desktop.lifecycle.recoveries(),
        "shutting down"
    );
    desktop.scene.destroy();
    desktop.renderer = None;
    desktop.lifecycle.release_all_resources();
    Ok(result?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(&cli) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{e:#}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_reaches_waiting_viewer() {
        let (tx, rx) = mpsc::channel();
        assert!(send_world(&tx, &Config::new()));
        assert!(rx.recv().unwrap().is_ok());
    }

    #[test]
    fn world_is_discarded_when_viewer_is_gone() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(!send_world(&tx, &Config::new()));
    }
}
