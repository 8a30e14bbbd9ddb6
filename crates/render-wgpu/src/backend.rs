//! [`GraphicsBackend`] on top of wgpu.
//!
//! The factory owns the instance and the window surface; the swap chain is
//! the surface configuration. Colour and depth targets are offscreen
//! textures so the sky pass can sample them before writing the frame.

use cubeworld_common::Extent2D;
use cubeworld_render::{
    BackBufferFormat, BackendError, ColorSpace, DepthFormat, FeatureLevel, GraphicsBackend,
    PresentFeature, PresentSync, SwapChainDesc,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub fn texture_format(format: BackBufferFormat) -> wgpu::TextureFormat {
    match format {
        BackBufferFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        BackBufferFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        BackBufferFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        BackBufferFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        BackBufferFormat::Rgb10a2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
        BackBufferFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

pub fn depth_texture_format(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn is_hdr_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgb10a2Unorm | wgpu::TextureFormat::Rgba16Float
    )
}

pub struct WgpuFactory {
    instance: wgpu::Instance,
    surface: Arc<wgpu::Surface<'static>>,
    /// Surface capabilities on the preferred adapter, empty if none was found.
    capabilities: wgpu::SurfaceCapabilities,
}

pub struct WgpuDevice {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
    lost_reason: Arc<Mutex<String>>,
}

impl WgpuDevice {
    fn check_lost(&self) -> Result<(), BackendError> {
        if self.lost.load(Ordering::Acquire) {
            let reason = self
                .lost_reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            return Err(BackendError::DeviceRemoved(reason));
        }
        Ok(())
    }
}

pub struct WgpuSwapChain {
    surface: Arc<wgpu::Surface<'static>>,
    pub config: wgpu::SurfaceConfiguration,
    pub color_space: ColorSpace,
}

pub struct WgpuColorTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

pub struct WgpuDepthTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// wgpu presentation for one window of type `W`.
pub struct WgpuBackend<W> {
    window: Arc<W>,
    backends: wgpu::Backends,
    power_preference: wgpu::PowerPreference,
}

impl<W> WgpuBackend<W>
where
    W: wgpu::WindowHandle + 'static,
{
    pub fn new(window: Arc<W>) -> Self {
        Self {
            window,
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }

    pub fn with_backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    fn request_adapter(
        &self,
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
    ) -> Option<wgpu::Adapter> {
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: self.power_preference,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
    }
}

fn feature_level(adapter: &wgpu::Adapter) -> FeatureLevel {
    let downlevel = adapter.get_downlevel_capabilities();
    if downlevel.is_webgpu_compliant() {
        FeatureLevel::Level11_1
    } else if downlevel
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    {
        FeatureLevel::Level11_0
    } else {
        FeatureLevel::Level10_0
    }
}

impl<W> GraphicsBackend for WgpuBackend<W>
where
    W: wgpu::WindowHandle + 'static,
{
    type Factory = WgpuFactory;
    type Device = WgpuDevice;
    type SwapChain = WgpuSwapChain;
    type ColorTarget = WgpuColorTarget;
    type DepthTarget = WgpuDepthTarget;
    type Frame = wgpu::SurfaceTexture;

    fn create_factory(&mut self) -> Result<WgpuFactory, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: self.backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&self.window))
            .map_err(|e| BackendError::Api(e.to_string()))?;
        let capabilities = self
            .request_adapter(&instance, &surface)
            .map(|adapter| surface.get_capabilities(&adapter))
            .unwrap_or_default();
        Ok(WgpuFactory {
            instance,
            surface: Arc::new(surface),
            capabilities,
        })
    }

    fn is_factory_current(&self, _factory: &WgpuFactory) -> bool {
        // wgpu caches no output list that could go stale.
        true
    }

    fn supports(&self, factory: &WgpuFactory, feature: PresentFeature) -> bool {
        let caps = &factory.capabilities;
        match feature {
            PresentFeature::FlipModel => !caps.formats.is_empty(),
            PresentFeature::Tearing => caps.present_modes.contains(&wgpu::PresentMode::Immediate),
            PresentFeature::Hdr => caps.formats.iter().copied().any(is_hdr_format),
        }
    }

    fn create_device(
        &mut self,
        factory: &WgpuFactory,
        min_level: FeatureLevel,
    ) -> Result<(WgpuDevice, FeatureLevel), BackendError> {
        let adapter = self
            .request_adapter(&factory.instance, &factory.surface)
            .ok_or(BackendError::AdapterNotFound)?;
        let level = feature_level(&adapter);
        if level < min_level {
            return Err(BackendError::FeatureLevelTooLow {
                required: min_level,
                achieved: level,
            });
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cubeworld_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| BackendError::Api(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_reason = Arc::new(Mutex::new(String::new()));
        {
            let lost = Arc::clone(&lost);
            let lost_reason = Arc::clone(&lost_reason);
            device.set_device_lost_callback(move |reason, message| {
                *lost_reason.lock().unwrap_or_else(PoisonError::into_inner) =
                    format!("{reason:?}: {message}");
                lost.store(true, Ordering::Release);
            });
        }

        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = info.backend.to_str(),
            "wgpu device created"
        );
        Ok((
            WgpuDevice {
                adapter,
                device,
                queue,
                lost,
                lost_reason,
            },
            level,
        ))
    }

    fn create_swap_chain(
        &mut self,
        factory: &WgpuFactory,
        device: &WgpuDevice,
        desc: &SwapChainDesc,
    ) -> Result<WgpuSwapChain, BackendError> {
        device.check_lost()?;
        let caps = factory.surface.get_capabilities(&device.adapter);
        let wanted = texture_format(desc.format);
        let format = if caps.formats.contains(&wanted) {
            wanted
        } else {
            let fallback = caps
                .formats
                .iter()
                .copied()
                .find(|f| !f.is_srgb())
                .or_else(|| caps.formats.first().copied())
                .ok_or_else(|| BackendError::Api("surface reports no formats".into()))?;
            tracing::warn!(?wanted, ?fallback, "back-buffer format unsupported by surface");
            fallback
        };
        let present_mode =
            if desc.allow_tearing && caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
                wgpu::PresentMode::Immediate
            } else {
                wgpu::PresentMode::Fifo
            };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: desc.size.width,
            height: desc.size.height,
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: desc.buffer_count.clamp(1, 3),
        };
        factory.surface.configure(&device.device, &config);
        Ok(WgpuSwapChain {
            surface: Arc::clone(&factory.surface),
            config,
            color_space: ColorSpace::default(),
        })
    }

    fn resize_swap_chain(
        &mut self,
        device: &WgpuDevice,
        swap_chain: &mut WgpuSwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), BackendError> {
        device.check_lost()?;
        swap_chain.config.width = desc.size.width;
        swap_chain.config.height = desc.size.height;
        swap_chain.surface.configure(&device.device, &swap_chain.config);
        Ok(())
    }

    fn unbind_targets(&mut self, device: &WgpuDevice) {
        // Bindings live in per-frame bind groups; wait for the GPU to let go of the old textures.
        let _ = device.device.poll(wgpu::Maintain::Wait);
    }

    fn output_is_hdr10(&self, factory: &WgpuFactory, _swap_chain: &WgpuSwapChain) -> bool {
        factory
            .capabilities
            .formats
            .contains(&wgpu::TextureFormat::Rgb10a2Unorm)
    }

    fn apply_color_space(
        &mut self,
        swap_chain: &mut WgpuSwapChain,
        color_space: ColorSpace,
    ) -> Result<bool, BackendError> {
        let supported =
            color_space == ColorSpace::SrgbG22P709 || is_hdr_format(swap_chain.config.format);
        if supported {
            swap_chain.color_space = color_space;
        }
        Ok(supported)
    }

    fn create_color_target(
        &mut self,
        device: &WgpuDevice,
        swap_chain: &WgpuSwapChain,
        _desc: &SwapChainDesc,
    ) -> Result<WgpuColorTarget, BackendError> {
        device.check_lost()?;
        let format = swap_chain.config.format;
        let texture = device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_color"),
            size: wgpu::Extent3d {
                width: swap_chain.config.width,
                height: swap_chain.config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Ok(WgpuColorTarget {
            texture,
            view,
            format,
        })
    }

    fn create_depth_target(
        &mut self,
        device: &WgpuDevice,
        format: DepthFormat,
        size: Extent2D,
    ) -> Result<WgpuDepthTarget, BackendError> {
        device.check_lost()?;
        let format = depth_texture_format(format);
        let texture = device.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_depth"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        Ok(WgpuDepthTarget {
            texture,
            view,
            format,
        })
    }

    fn acquire_frame(
        &mut self,
        device: &WgpuDevice,
        swap_chain: &mut WgpuSwapChain,
    ) -> Result<wgpu::SurfaceTexture, BackendError> {
        device.check_lost()?;
        swap_chain
            .surface
            .get_current_texture()
            .map_err(|e| match e {
                wgpu::SurfaceError::Timeout => BackendError::Timeout,
                wgpu::SurfaceError::Outdated => BackendError::SurfaceOutdated,
                wgpu::SurfaceError::Lost => BackendError::DeviceReset,
                wgpu::SurfaceError::OutOfMemory => BackendError::DeviceRemoved("out of memory".into()),
                other => BackendError::Api(other.to_string()),
            })
    }

    fn present(
        &mut self,
        device: &WgpuDevice,
        _swap_chain: &mut WgpuSwapChain,
        frame: wgpu::SurfaceTexture,
        _sync: PresentSync,
    ) -> Result<(), BackendError> {
        // Vsync is fixed by the configured present mode.
        frame.present();
        device.check_lost()
    }
}
