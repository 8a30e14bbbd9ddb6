use crate::camera::FreeFlightCamera;
use crate::entity::{Entity, EntityKey};
use crate::light::LightSet;
use crate::scene::{SceneRenderer, SkySettings};
use crate::world::VoxelWorld;
use glam::Vec3;
use std::convert::Infallible;
use std::fmt::Write as _;

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    BeginPass {
        eye: Vec3,
        lights: usize,
    },
    Entity {
        key: EntityKey,
        kind: &'static str,
        position: Vec3,
    },
    VoxelWorld {
        vertices: usize,
        revision: u64,
    },
    EndPass,
    PostProcess {
        heaven: Vec3,
        hell: Vec3,
    },
}

/// Renderer that records the calls a frame makes instead of drawing.
///
/// Useful for CLI output, logging, and testing scene orchestration without a GPU.
#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Human-readable dump of the recorded frame.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for cmd in &self.commands {
            let _ = match cmd {
                DrawCommand::BeginPass { eye, lights } => writeln!(
                    out,
                    "begin pass: eye=({:.1}, {:.1}, {:.1}) lights={lights}",
                    eye.x, eye.y, eye.z
                ),
                DrawCommand::Entity {
                    key,
                    kind,
                    position,
                } => writeln!(
                    out,
                    "  {kind} {key:?} pos=({:.2}, {:.2}, {:.2})",
                    position.x, position.y, position.z
                ),
                DrawCommand::VoxelWorld { vertices, revision } => {
                    writeln!(out, "  voxel world: {vertices} vertices (rev {revision})")
                }
                DrawCommand::EndPass => writeln!(out, "end pass"),
                DrawCommand::PostProcess { .. } => writeln!(out, "post-process: sky"),
            };
        }
        out
    }
}

impl SceneRenderer for DrawList {
    type Error = Infallible;

    fn begin_pass(&mut self, camera: &FreeFlightCamera, lights: &LightSet) -> Result<(), Infallible> {
        self.commands.push(DrawCommand::BeginPass {
            eye: camera.position,
            lights: lights.enabled().count(),
        });
        Ok(())
    }

    fn draw_entity(&mut self, key: EntityKey, entity: &Entity) -> Result<(), Infallible> {
        self.commands.push(DrawCommand::Entity {
            key,
            kind: entity.kind_name(),
            position: entity.transform().position,
        });
        Ok(())
    }

    fn draw_voxel_world(&mut self, world: &VoxelWorld) -> Result<(), Infallible> {
        self.commands.push(DrawCommand::VoxelWorld {
            vertices: world.mesh().len(),
            revision: world.revision(),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), Infallible> {
        self.commands.push(DrawCommand::EndPass);
        Ok(())
    }

    fn post_process(&mut self, _camera: &FreeFlightCamera, sky: &SkySettings) -> Result<(), Infallible> {
        self.commands.push(DrawCommand::PostProcess {
            heaven: sky.heaven_color,
            hell: sky.hell_color,
        });
        Ok(())
    }
}
