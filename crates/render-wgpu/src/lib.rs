//! wgpu implementation of the cube world renderer.
//!
//! [`WgpuBackend`] plugs into [`cubeworld_render::DeviceLifecycle`];
//! [`WgpuRenderer`] holds the pipelines for one device generation and
//! records frames through [`cubeworld_render::SceneRenderer`].

mod backend;
mod gpu;
mod shaders;

pub use backend::{
    WgpuBackend, WgpuColorTarget, WgpuDepthTarget, WgpuDevice, WgpuFactory, WgpuSwapChain,
    depth_texture_format, texture_format,
};
pub use gpu::{GpuError, GpuFrame, WgpuRenderer};

pub fn crate_info() -> &'static str {
    "cubeworld-render-wgpu v0.1.0"
}
