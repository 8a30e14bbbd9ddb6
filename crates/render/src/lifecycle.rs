//! Device and swap-chain lifecycle with device-loss recovery.
//!
//! # Invariants
//! - Size-dependent resources (colour target, depth target, viewport) always
//!   match the last successfully applied size.
//! - On device loss every resource is released (targets, swap chain, device,
//!   factory) before anything is recreated; no mixed-generation set is exposed.
//! - Recovery runs at most once per detected loss. A loss reported while
//!   recovery recreates the swap chain is fatal.

use crate::backend::{
    BackBufferFormat, BackendError, ColorSpace, DepthFormat, FeatureLevel, GraphicsBackend,
    PresentFeature, PresentOptions, SwapChainDesc, Viewport,
};
use cubeworld_common::{Config, ConfigError, Extent2D};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer construction failed: {0}")]
    Construction(#[source] BackendError),
    #[error("device recovery failed: {0}")]
    RecoveryFailed(#[source] BackendError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("renderer has no device")]
    NotReady,
}

/// Static renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    pub back_buffer_format: BackBufferFormat,
    /// `None` disables the depth buffer.
    pub depth_format: Option<DepthFormat>,
    pub back_buffer_count: u32,
    pub min_feature_level: FeatureLevel,
    pub present: PresentOptions,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            back_buffer_format: BackBufferFormat::Bgra8Unorm,
            depth_format: Some(DepthFormat::Depth32Float),
            back_buffer_count: 2,
            min_feature_level: FeatureLevel::Level11_0,
            present: PresentOptions::default(),
        }
    }
}

impl RendererOptions {
    /// Read the `Renderer.*` keys, defaulting anything absent.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let present = PresentOptions {
            flip_present: config
                .get_bool_or_default("Renderer.FlipPresent", defaults.present.flip_present)?,
            allow_tearing: config
                .get_bool_or_default("Renderer.AllowTearing", defaults.present.allow_tearing)?,
            enable_hdr: config
                .get_bool_or_default("Renderer.EnableHdr", defaults.present.enable_hdr)?,
        };
        let depth_format = config
            .get_bool_or_default("Renderer.DepthBuffer", true)?
            .then_some(DepthFormat::Depth32Float);
        let count = config.get_int_or_default(
            "Renderer.BackBufferCount",
            i64::from(defaults.back_buffer_count),
        )?;
        let back_buffer_count = u32::try_from(count)
            .ok()
            .filter(|n| (1..=16).contains(n))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "Renderer.BackBufferCount".into(),
                value: count.to_string(),
                expected: "a buffer count between 1 and 16",
            })?;
        Ok(Self {
            depth_format,
            back_buffer_count,
            present,
            ..defaults
        })
    }

    /// The format actually used for the swap chain.
    pub fn effective_format(&self) -> BackBufferFormat {
        if self.present.any() {
            self.back_buffer_format.without_srgb()
        } else {
            self.back_buffer_format
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing created yet.
    Uninitialized,
    /// Device exists; size-dependent resources do not.
    DeviceReady,
    /// All resources exist and match the current size.
    Ready,
    /// Released after a loss, recreation in progress.
    Recovering,
    /// Recovery failed; the lifecycle is unusable.
    Failed,
}

/// Outcome of [`DeviceLifecycle::acquire_frame`].
#[derive(Debug)]
pub enum FrameAcquire<F> {
    Ready(F),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Recovered,
    Reconfigured,
    Timeout,
}

/// Outcome of [`DeviceLifecycle::present`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The device was lost and recreated; nothing was shown this frame.
    Recovered,
}

/// Owns the factory, device, swap chain and size-dependent targets of one window.
pub struct DeviceLifecycle<B: GraphicsBackend> {
    backend: B,
    options: RendererOptions,
    factory: Option<B::Factory>,
    device: Option<B::Device>,
    feature_level: Option<FeatureLevel>,
    swap_chain: Option<B::SwapChain>,
    color_target: Option<B::ColorTarget>,
    depth_target: Option<B::DepthTarget>,
    viewport: Option<Viewport>,
    size: Extent2D,
    color_space: ColorSpace,
    generation: u64,
    recoveries: u64,
    frames_presented: u64,
    state: LifecycleState,
}

impl<B: GraphicsBackend> DeviceLifecycle<B> {
    /// A lifecycle with no resources. Call [`Self::create_device_resources`] next.
    pub fn new(backend: B, options: RendererOptions, size: Extent2D) -> Self {
        Self {
            backend,
            options,
            factory: None,
            device: None,
            feature_level: None,
            swap_chain: None,
            color_target: None,
            depth_target: None,
            viewport: None,
            size,
            color_space: ColorSpace::default(),
            generation: 0,
            recoveries: 0,
            frames_presented: 0,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Create every resource for a window of `size`.
    pub fn create(backend: B, options: RendererOptions, size: Extent2D) -> Result<Self, RenderError> {
        let mut lifecycle = Self::new(backend, options, size);
        let construction = |e: RenderError| match e {
            RenderError::Backend(e) => RenderError::Construction(e),
            other => other,
        };
        lifecycle.create_device_resources().map_err(construction)?;
        lifecycle
            .create_size_dependent_resources(size)
            .map_err(construction)?;
        Ok(lifecycle)
    }

    /// Factory, option negotiation and device.
    pub fn create_device_resources(&mut self) -> Result<(), RenderError> {
        let factory = self.backend.create_factory()?;
        self.negotiate_options(&factory);

        let min = self.options.min_feature_level;
        let (device, achieved) = self.backend.create_device(&factory, min)?;
        if achieved < min {
            return Err(BackendError::FeatureLevelTooLow {
                required: min,
                achieved,
            }
            .into());
        }

        self.factory = Some(factory);
        self.device = Some(device);
        self.feature_level = Some(achieved);
        self.generation += 1;
        self.state = LifecycleState::DeviceReady;
        tracing::info!(
            generation = self.generation,
            feature_level = ?achieved,
            options = ?self.options.present,
            "graphics device created"
        );
        Ok(())
    }

    /// (Re)build the swap chain, targets and viewport for `size`.
    ///
    /// On failure the lifecycle drops out of [`LifecycleState::Ready`] and keeps
    /// the previous size, so the next call retries.
    pub fn create_size_dependent_resources(&mut self, size: Extent2D) -> Result<(), RenderError> {
        self.apply_size(size, false)
    }

    /// Returns `false` when `size` is already current; only the colour space is refreshed then.
    pub fn on_size_changed(&mut self, size: Extent2D) -> Result<bool, RenderError> {
        if size == self.size && self.state == LifecycleState::Ready {
            self.update_color_space();
            return Ok(false);
        }
        tracing::debug!(width = size.width, height = size.height, "surface resized");
        self.create_size_dependent_resources(size)?;
        Ok(true)
    }

    /// Fetch the back buffer for this frame.
    ///
    /// Device loss triggers recovery, an outdated surface is reconfigured and a
    /// timeout skips the frame.
    pub fn acquire_frame(&mut self) -> Result<FrameAcquire<B::Frame>, RenderError> {
        if self.state != LifecycleState::Ready {
            return Err(RenderError::NotReady);
        }
        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_mut())
        else {
            return Err(RenderError::NotReady);
        };
        match self.backend.acquire_frame(device, swap_chain) {
            Ok(frame) => Ok(FrameAcquire::Ready(frame)),
            Err(e) if e.is_device_lost() => {
                self.recover(e)?;
                Ok(FrameAcquire::Skipped(SkipReason::Recovered))
            }
            Err(BackendError::SurfaceOutdated) => {
                self.apply_size(self.size, false)?;
                Ok(FrameAcquire::Skipped(SkipReason::Reconfigured))
            }
            Err(BackendError::Timeout) => {
                tracing::warn!("frame acquisition timed out, skipping frame");
                Ok(FrameAcquire::Skipped(SkipReason::Timeout))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Present a frame obtained from [`Self::acquire_frame`].
    pub fn present(&mut self, frame: B::Frame) -> Result<PresentOutcome, RenderError> {
        let sync = self.options.present.sync();
        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_mut())
        else {
            return Err(RenderError::NotReady);
        };
        match self.backend.present(device, swap_chain, frame, sync) {
            Ok(()) => {
                self.frames_presented += 1;
                let stale = self
                    .factory
                    .as_ref()
                    .is_some_and(|f| !self.backend.is_factory_current(f));
                if stale {
                    tracing::debug!("output information stale, recreating factory");
                    self.factory = Some(self.backend.create_factory()?);
                }
                Ok(PresentOutcome::Presented)
            }
            Err(e) if e.is_device_lost() => {
                self.recover(e)?;
                Ok(PresentOutcome::Recovered)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every resource in dependency order: targets, swap chain, device, factory.
    pub fn release_all_resources(&mut self) {
        if let Some(device) = self.device.as_ref() {
            self.backend.unbind_targets(device);
        }
        self.viewport = None;
        self.color_target = None;
        self.depth_target = None;
        self.swap_chain = None;
        self.device = None;
        self.feature_level = None;
        self.factory = None;
        self.state = LifecycleState::Uninitialized;
    }

    /// Full synchronous recreation after `cause`.
    pub fn recover(&mut self, cause: BackendError) -> Result<(), RenderError> {
        let _span = tracing::info_span!("device_recovery", generation = self.generation).entered();
        tracing::warn!(%cause, "graphics device lost, recreating all resources");

        self.release_all_resources();
        self.state = LifecycleState::Recovering;
        self.recoveries += 1;

        let result = self
            .create_device_resources()
            .and_then(|()| self.apply_size(self.size, true));
        match result {
            Ok(()) => {
                tracing::info!(generation = self.generation, "graphics device recovered");
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Failed;
                tracing::error!(error = %e, "graphics device recovery failed");
                Err(match e {
                    RenderError::Backend(e) | RenderError::Construction(e) => {
                        RenderError::RecoveryFailed(e)
                    }
                    other => other,
                })
            }
        }
    }

    fn negotiate_options(&mut self, factory: &B::Factory) {
        let present = &mut self.options.present;
        let probes = [
            (PresentFeature::Tearing, &mut present.allow_tearing),
            (PresentFeature::Hdr, &mut present.enable_hdr),
            (PresentFeature::FlipModel, &mut present.flip_present),
        ];
        for (feature, enabled) in probes {
            if *enabled && !self.backend.supports(factory, feature) {
                *enabled = false;
                tracing::warn!(?feature, "presentation feature unsupported, disabled");
            }
        }
    }

    fn apply_size(&mut self, size: Extent2D, recovering: bool) -> Result<(), RenderError> {
        let Some(device) = self.device.as_ref() else {
            return Err(RenderError::NotReady);
        };

        // Not ready again until every target exists for the new size.
        if self.state == LifecycleState::Ready {
            self.state = LifecycleState::DeviceReady;
        }
        self.backend.unbind_targets(device);
        self.viewport = None;
        self.color_target = None;
        self.depth_target = None;

        let buffer = size.at_least_one();
        let desc = SwapChainDesc {
            size: buffer,
            format: self.options.effective_format(),
            buffer_count: self.options.back_buffer_count,
            flip_model: self.options.present.any(),
            allow_tearing: self.options.present.allow_tearing,
        };

        let sized = match self.swap_chain.as_mut() {
            Some(swap_chain) => self.backend.resize_swap_chain(device, swap_chain, &desc),
            None => match self.factory.as_ref() {
                Some(factory) => self
                    .backend
                    .create_swap_chain(factory, device, &desc)
                    .map(|sc| self.swap_chain = Some(sc)),
                None => return Err(RenderError::NotReady),
            },
        };
        match sized {
            Ok(()) => {}
            Err(e) if e.is_device_lost() && recovering => {
                return Err(RenderError::RecoveryFailed(e));
            }
            Err(e) if e.is_device_lost() => {
                self.size = size;
                return self.recover(e);
            }
            Err(e) => return Err(e.into()),
        }

        self.update_color_space();

        let (Some(device), Some(swap_chain)) = (self.device.as_ref(), self.swap_chain.as_ref())
        else {
            return Err(RenderError::NotReady);
        };
        self.color_target = Some(self.backend.create_color_target(device, swap_chain, &desc)?);
        if let Some(format) = self.options.depth_format {
            self.depth_target = Some(self.backend.create_depth_target(device, format, buffer)?);
        }
        self.viewport = Some(Viewport::covering(buffer));
        self.size = size;
        self.state = LifecycleState::Ready;
        tracing::debug!(
            width = buffer.width,
            height = buffer.height,
            format = ?desc.format,
            "size-dependent resources created"
        );
        Ok(())
    }

    fn update_color_space(&mut self) {
        let hdr10 = match (self.factory.as_ref(), self.swap_chain.as_ref()) {
            (Some(factory), Some(swap_chain)) => self.backend.output_is_hdr10(factory, swap_chain),
            _ => false,
        };
        let color_space = ColorSpace::select(
            self.options.present.enable_hdr,
            hdr10,
            self.options.back_buffer_format,
        );
        self.color_space = color_space;
        if let Some(swap_chain) = self.swap_chain.as_mut() {
            match self.backend.apply_color_space(swap_chain, color_space) {
                Ok(true) => {}
                Ok(false) => tracing::debug!(?color_space, "colour space not supported by swap chain"),
                Err(e) => tracing::warn!(error = %e, "failed to set colour space"),
            }
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn device(&self) -> Option<&B::Device> {
        self.device.as_ref()
    }

    pub fn swap_chain(&self) -> Option<&B::SwapChain> {
        self.swap_chain.as_ref()
    }

    pub fn color_target(&self) -> Option<&B::ColorTarget> {
        self.color_target.as_ref()
    }

    pub fn depth_target(&self) -> Option<&B::DepthTarget> {
        self.depth_target.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Requested window size.
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// Actual back-buffer size (never below 1x1).
    pub fn back_buffer_size(&self) -> Extent2D {
        self.size.at_least_one()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        self.feature_level
    }

    /// Bumped on every device creation; renderers rebuild device objects when it changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }
}
