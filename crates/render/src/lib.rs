//! Rendering adapter: device lifecycle and scene orchestration, independent
//! of any graphics API.
//!
//! # Invariants
//! - The lifecycle exclusively owns device, swap chain and targets; the scene
//!   only borrows them for the duration of a call.
//! - After a device loss every resource is released before any is recreated.
//! - Render order within a frame is fixed: entities, voxel world, post-process.

pub mod backend;
pub mod camera;
pub mod draw_list;
pub mod entity;
pub mod headless;
pub mod lifecycle;
pub mod light;
pub mod scene;
pub mod world;

pub use backend::{
    BackBufferFormat, BackendError, ColorSpace, DepthFormat, FeatureLevel, GraphicsBackend,
    PresentFeature, PresentOptions, PresentSync, SwapChainDesc, Viewport,
};
pub use camera::{CameraInput, FreeFlightCamera, MoveSpeed, smooth_damp};
pub use draw_list::{DrawCommand, DrawList};
pub use entity::{Entity, EntityArena, EntityKey};
pub use headless::{BackendCall, HeadlessBackend, HeadlessCapabilities, Journal, Op, Resource};
pub use lifecycle::{
    DeviceLifecycle, FrameAcquire, LifecycleState, PresentOutcome, RenderError, RendererOptions,
    SkipReason,
};
pub use light::{Light, LightKind, LightSet, LightingUniform, MAX_LIGHTS};
pub use scene::{CameraSettings, Scene, SceneRenderer, SkySettings, SkyUniform};
pub use world::{
    DEFAULT_TERRAIN_SIZE, Material, VoxelObjectUniform, VoxelWorld, WorldLoadError, terrain_grid,
};

pub fn crate_info() -> &'static str {
    "cubeworld-render v0.1.0"
}
