//! Scene orchestration: camera, lights, entities and the voxel world.

use crate::camera::{CameraInput, FreeFlightCamera};
use crate::entity::{Entity, EntityArena, EntityKey};
use crate::light::{Light, LightSet};
use crate::world::VoxelWorld;
use bytemuck::{Pod, Zeroable};
use cubeworld_common::{Config, ConfigError};
use glam::Vec3;
use serde::Serialize;

/// Colours of the sky post-process, blended by view elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkySettings {
    pub heaven_color: Vec3,
    pub hell_color: Vec3,
}

impl Default for SkySettings {
    fn default() -> Self {
        Self {
            heaven_color: Vec3::new(0.35, 0.55, 0.9),
            hell_color: Vec3::new(0.08, 0.06, 0.05),
        }
    }
}

/// GPU layout of the sky pass parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SkyUniform {
    pub inv_view_proj: [[f32; 4]; 4],
    pub heaven: [f32; 4],
    pub hell: [f32; 4],
    /// xyz: direction towards the sun, w: 1 if a sun exists.
    pub sun: [f32; 4],
    pub z_near: f32,
    pub z_far: f32,
    /// 1 when the depth input holds the main pass depth.
    pub depth_valid: f32,
    pub _pad: f32,
}

impl SkySettings {
    pub fn to_uniform(&self, camera: &FreeFlightCamera, lights: &LightSet) -> SkyUniform {
        let sun = lights
            .enabled()
            .find(|l| l.kind == crate::light::LightKind::Directional)
            .map_or([0.0; 4], |l| (-l.direction).extend(1.0).to_array());
        SkyUniform {
            inv_view_proj: camera.view_projection().inverse().to_cols_array_2d(),
            heaven: self.heaven_color.extend(1.0).to_array(),
            hell: self.hell_color.extend(1.0).to_array(),
            sun,
            z_near: camera.near,
            z_far: camera.far,
            depth_valid: 1.0,
            _pad: 0.0,
        }
    }
}

/// Backend-specific drawing of a scene frame.
///
/// Called in a fixed order: `begin_pass`, every entity, the voxel world,
/// `end_pass`, then `post_process` against the presented target.
pub trait SceneRenderer {
    type Error;

    /// Bind per-frame camera and lighting state.
    fn begin_pass(&mut self, camera: &FreeFlightCamera, lights: &LightSet) -> Result<(), Self::Error>;
    fn draw_entity(&mut self, key: EntityKey, entity: &Entity) -> Result<(), Self::Error>;
    fn draw_voxel_world(&mut self, world: &VoxelWorld) -> Result<(), Self::Error>;
    fn end_pass(&mut self) -> Result<(), Self::Error>;
    /// Screen-space pass reading the main pass colour and depth.
    fn post_process(&mut self, camera: &FreeFlightCamera, sky: &SkySettings) -> Result<(), Self::Error>;
}

/// Camera parameters read from `Camera.*` keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

impl CameraSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            fov_degrees: config.get_float_or_default("Camera.FieldOfView", f64::from(d.fov_degrees))? as f32,
            near: config.get_float_or_default("Camera.Near", f64::from(d.near))? as f32,
            far: config.get_float_or_default("Camera.Far", f64::from(d.far))? as f32,
        })
    }
}

/// Flat collection of entities plus the camera, lights and one voxel world.
///
/// Entity animation runs on the fixed tick ([`Scene::fixed_update`]); the
/// camera tracks real time on the variable pass ([`Scene::update`]).
/// GPU resources are never owned here.
#[derive(Debug)]
pub struct Scene {
    camera: FreeFlightCamera,
    camera_input: CameraInput,
    lights: LightSet,
    entities: EntityArena,
    world: Option<VoxelWorld>,
    sky: SkySettings,
    initialized: bool,
    fixed_ticks: u64,
    elapsed: f64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

impl Scene {
    pub fn new(settings: CameraSettings) -> Self {
        let camera = FreeFlightCamera::new(
            settings.fov_degrees.to_radians(),
            settings.near,
            settings.far,
        );
        Self {
            camera,
            camera_input: CameraInput::default(),
            lights: LightSet::new(),
            entities: EntityArena::new(),
            world: None,
            sky: SkySettings::default(),
            initialized: false,
            fixed_ticks: 0,
            elapsed: 0.0,
        }
    }

    /// Populate lights, demo entities and the optional voxel world.
    pub fn init(&mut self, world: Option<VoxelWorld>) {
        self.lights = LightSet::new();
        self.lights.add(Light::directional(
            Vec3::new(-0.4, -1.0, 0.6),
            Vec3::ONE,
            1.0,
        ));
        self.lights.add(Light::point(
            Vec3::new(0.0, 6.0, 0.0),
            Vec3::new(1.0, 0.85, 0.6),
            0.8,
        ));
        self.lights.eye_position = self.camera.position;

        self.entities.clear();
        self.entities
            .insert(Entity::prop(Vec3::new(-4.0, 1.0, 0.0), Vec3::new(0.8, 0.3, 0.3)));
        self.entities.insert(Entity::spinner(
            Vec3::new(4.0, 1.0, 0.0),
            Vec3::new(0.3, 1.0, 0.0),
            1.2,
            Vec3::new(0.3, 0.8, 0.3),
        ));
        self.entities.insert(Entity::orbiter(
            Vec3::new(0.0, 4.0, 0.0),
            6.0,
            0.5,
            Vec3::new(0.3, 0.3, 0.8),
        ));

        self.world = world;
        self.initialized = true;
        tracing::info!(
            entities = self.entities.len(),
            voxel_vertices = self.world.as_ref().map_or(0, |w| w.mesh().len()),
            "scene initialised"
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_camera_input(&mut self, input: CameraInput) {
        self.camera_input = input;
    }

    /// One fixed simulation step of `period` seconds.
    pub fn fixed_update(&mut self, period: f64) {
        let dt = period as f32;
        for entity in self.entities.values_mut() {
            entity.update(dt);
        }
        self.fixed_ticks += 1;
    }

    /// Variable-rate update: camera smoothing and the light eye position.
    pub fn update(&mut self, dt: f64) {
        self.elapsed += dt;
        self.camera.update(&self.camera_input, dt as f32);
        self.lights.eye_position = self.camera.position;
    }

    /// Main pass: entities first, then the voxel world.
    pub fn render<R: SceneRenderer>(&self, renderer: &mut R) -> Result<(), R::Error> {
        renderer.begin_pass(&self.camera, &self.lights)?;
        for (key, entity) in self.entities.iter() {
            renderer.draw_entity(key, entity)?;
        }
        if let Some(world) = &self.world {
            renderer.draw_voxel_world(world)?;
        }
        renderer.end_pass()
    }

    pub fn post_process<R: SceneRenderer>(&self, renderer: &mut R) -> Result<(), R::Error> {
        renderer.post_process(&self.camera, &self.sky)
    }

    /// Recompute the camera aspect. GPU resources are rebuilt by the device lifecycle.
    pub fn on_screen_size_change(&mut self, width: u32, height: u32) {
        self.camera.on_screen_size_change(width, height);
    }

    pub fn destroy(&mut self) {
        self.entities.clear();
        self.world = None;
        self.lights = LightSet::new();
        self.initialized = false;
        tracing::debug!("scene destroyed");
    }

    pub fn camera(&self) -> &FreeFlightCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut FreeFlightCamera {
        &mut self.camera
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightSet {
        &mut self.lights
    }

    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityArena {
        &mut self.entities
    }

    pub fn world(&self) -> Option<&VoxelWorld> {
        self.world.as_ref()
    }

    pub fn world_mut(&mut self) -> Option<&mut VoxelWorld> {
        self.world.as_mut()
    }

    pub fn sky(&self) -> &SkySettings {
        &self.sky
    }

    pub fn sky_mut(&mut self) -> &mut SkySettings {
        &mut self.sky
    }

    pub fn fixed_ticks(&self) -> u64 {
        self.fixed_ticks
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}
