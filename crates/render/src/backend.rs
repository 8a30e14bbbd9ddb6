//! The seam between the device lifecycle and a concrete graphics API.

use cubeworld_common::Extent2D;
use serde::{Deserialize, Serialize};

/// Failures reported by a graphics backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("device removed: {0}")]
    DeviceRemoved(String),
    #[error("device reset")]
    DeviceReset,
    #[error("presentation surface is out of date")]
    SurfaceOutdated,
    #[error("timed out waiting for the next frame")]
    Timeout,
    #[error("no suitable graphics adapter found")]
    AdapterNotFound,
    #[error("feature level {achieved:?} is below the required {required:?}")]
    FeatureLevelTooLow {
        required: FeatureLevel,
        achieved: FeatureLevel,
    },
    #[error("graphics API error: {0}")]
    Api(String),
}

impl BackendError {
    /// Removed or reset: every device object must be recreated.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceRemoved(_) | Self::DeviceReset)
    }
}

/// Hardware capability tier, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureLevel {
    Level9_1,
    Level9_2,
    Level9_3,
    Level10_0,
    Level10_1,
    Level11_0,
    Level11_1,
    Level12_0,
}

/// Optional presentation features probed after factory creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentFeature {
    FlipModel,
    Tearing,
    Hdr,
}

/// Presentation options. Each one is cleared if its capability probe fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentOptions {
    pub flip_present: bool,
    pub allow_tearing: bool,
    pub enable_hdr: bool,
}

impl Default for PresentOptions {
    fn default() -> Self {
        Self {
            flip_present: true,
            allow_tearing: false,
            enable_hdr: false,
        }
    }
}

impl PresentOptions {
    pub fn any(&self) -> bool {
        self.flip_present || self.allow_tearing || self.enable_hdr
    }

    pub fn sync(&self) -> PresentSync {
        if self.allow_tearing {
            PresentSync {
                interval: 0,
                allow_tearing: true,
            }
        } else {
            PresentSync {
                interval: 1,
                allow_tearing: false,
            }
        }
    }
}

/// How a present call waits for vertical blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentSync {
    pub interval: u32,
    pub allow_tearing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackBufferFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgb10a2Unorm,
    Rgba16Float,
}

impl BackBufferFormat {
    /// Flip-model swap chains cannot be created with sRGB formats.
    pub fn without_srgb(self) -> Self {
        match self {
            Self::Bgra8UnormSrgb => Self::Bgra8Unorm,
            Self::Rgba8UnormSrgb => Self::Rgba8Unorm,
            other => other,
        }
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, Self::Bgra8UnormSrgb | Self::Rgba8UnormSrgb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthFormat {
    Depth24Stencil8,
    Depth32Float,
}

/// Output colour space of the swap chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ColorSpace {
    /// sRGB gamma 2.2, Rec.709 primaries.
    #[default]
    SrgbG22P709,
    /// HDR10: ST.2084 curve, Rec.2020 primaries.
    Hdr10G2084P2020,
    /// Linear scRGB, Rec.709 primaries.
    LinearG10P709,
}

impl ColorSpace {
    pub fn select(hdr_enabled: bool, output_is_hdr10: bool, format: BackBufferFormat) -> Self {
        if !(hdr_enabled && output_is_hdr10) {
            return Self::SrgbG22P709;
        }
        match format {
            BackBufferFormat::Rgb10a2Unorm => Self::Hdr10G2084P2020,
            BackBufferFormat::Rgba16Float => Self::LinearG10P709,
            _ => Self::SrgbG22P709,
        }
    }
}

/// Everything needed to create or resize a swap chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub size: Extent2D,
    pub format: BackBufferFormat,
    pub buffer_count: u32,
    pub flip_model: bool,
    pub allow_tearing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport, never smaller than 1x1.
    pub fn covering(size: Extent2D) -> Self {
        let size = size.at_least_one();
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A graphics API as seen by [`crate::DeviceLifecycle`].
///
/// Handles are owned by the lifecycle; dropping one releases the underlying
/// object. Any call may report device loss, which the lifecycle turns into
/// a full recovery.
pub trait GraphicsBackend {
    type Factory;
    type Device;
    type SwapChain;
    type ColorTarget;
    type DepthTarget;
    type Frame;

    fn create_factory(&mut self) -> Result<Self::Factory, BackendError>;

    /// False once cached output information has gone stale.
    fn is_factory_current(&self, factory: &Self::Factory) -> bool;

    fn supports(&self, factory: &Self::Factory, feature: PresentFeature) -> bool;

    /// Pick a hardware adapter and create a device on it, reporting the level achieved.
    fn create_device(
        &mut self,
        factory: &Self::Factory,
        min_level: FeatureLevel,
    ) -> Result<(Self::Device, FeatureLevel), BackendError>;

    fn create_swap_chain(
        &mut self,
        factory: &Self::Factory,
        device: &Self::Device,
        desc: &SwapChainDesc,
    ) -> Result<Self::SwapChain, BackendError>;

    fn resize_swap_chain(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
        desc: &SwapChainDesc,
    ) -> Result<(), BackendError>;

    /// Detach render and depth targets from the pipeline before they are released.
    fn unbind_targets(&mut self, device: &Self::Device);

    fn output_is_hdr10(&self, factory: &Self::Factory, swap_chain: &Self::SwapChain) -> bool;

    /// Returns false when the swap chain cannot present in `color_space`.
    fn apply_color_space(
        &mut self,
        swap_chain: &mut Self::SwapChain,
        color_space: ColorSpace,
    ) -> Result<bool, BackendError>;

    fn create_color_target(
        &mut self,
        device: &Self::Device,
        swap_chain: &Self::SwapChain,
        desc: &SwapChainDesc,
    ) -> Result<Self::ColorTarget, BackendError>;

    fn create_depth_target(
        &mut self,
        device: &Self::Device,
        format: DepthFormat,
        size: Extent2D,
    ) -> Result<Self::DepthTarget, BackendError>;

    fn acquire_frame(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
    ) -> Result<Self::Frame, BackendError>;

    fn present(
        &mut self,
        device: &Self::Device,
        swap_chain: &mut Self::SwapChain,
        frame: Self::Frame,
        sync: PresentSync,
    ) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_is_stripped() {
        assert_eq!(
            BackBufferFormat::Bgra8UnormSrgb.without_srgb(),
            BackBufferFormat::Bgra8Unorm
        );
        assert_eq!(
            BackBufferFormat::Rgba16Float.without_srgb(),
            BackBufferFormat::Rgba16Float
        );
    }

    #[test]
    fn color_space_selection() {
        use BackBufferFormat::*;
        assert_eq!(ColorSpace::select(true, true, Rgb10a2Unorm), ColorSpace::Hdr10G2084P2020);
        assert_eq!(ColorSpace::select(true, true, Rgba16Float), ColorSpace::LinearG10P709);
        assert_eq!(ColorSpace::select(true, true, Bgra8Unorm), ColorSpace::SrgbG22P709);
        assert_eq!(ColorSpace::select(true, false, Rgb10a2Unorm), ColorSpace::SrgbG22P709);
        assert_eq!(ColorSpace::select(false, true, Rgb10a2Unorm), ColorSpace::SrgbG22P709);
    }

    #[test]
    fn tearing_presents_without_vsync() {
        let opts = PresentOptions {
            allow_tearing: true,
            ..Default::default()
        };
        assert_eq!(opts.sync().interval, 0);
        assert!(opts.sync().allow_tearing);
        assert_eq!(PresentOptions::default().sync().interval, 1);
    }

    #[test]
    fn feature_levels_are_ordered() {
        assert!(FeatureLevel::Level9_3 < FeatureLevel::Level10_0);
        assert!(FeatureLevel::Level11_1 > FeatureLevel::Level11_0);
    }

    #[test]
    fn viewport_is_never_degenerate() {
        let vp = Viewport::covering(Extent2D::new(0, 0));
        assert_eq!((vp.width, vp.height), (1.0, 1.0));
    }
}
