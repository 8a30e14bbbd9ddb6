use bytemuck::{Pod, Zeroable};
use cubeworld_common::{Config, ConfigError};
use cubeworld_voxel::{
    GridDimensions, MeshStats, MeshVertex, VoxelError, VoxelGrid, VoxelMeshBuilder, load_world_file,
};
use glam::{Mat4, Vec3};
use serde::Serialize;
use std::cell::Cell;

pub const DEFAULT_TERRAIN_SIZE: GridDimensions = GridDimensions::new(32, 8, 32);

#[derive(Debug, thiserror::Error)]
pub enum WorldLoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Voxel(#[from] VoxelError),
}

fn to_size(key: &str, value: i64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        value: value.to_string(),
        expected: "a non-negative size",
    })
}

fn axis(config: &Config, key: &str, default: usize) -> Result<usize, ConfigError> {
    to_size(key, config.get_int_or_default(key, default as i64)?)
}

fn axis_required(config: &Config, key: &str) -> Result<usize, ConfigError> {
    to_size(key, config.get_int(key)?)
}

/// Rolling heightmap filling the lower part of the grid.
pub fn terrain_grid(dims: GridDimensions) -> Result<VoxelGrid, VoxelError> {
    let top = dims.y.saturating_sub(1) as f32;
    VoxelGrid::from_fn(dims, |x, y, z| {
        let wave = ((x as f32 * 0.4).sin() + (z as f32 * 0.3).cos() + 2.0) * 0.25;
        y < 1 + (wave * top) as usize
    })
}

/// Phong material applied to every cube of a voxel world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Material {
    pub ambient_color: Vec3,
    pub ambient: f32,
    pub diffuse_color: Vec3,
    pub diffuse: f32,
    pub specular_color: Vec3,
    pub specular: f32,
    pub specular_power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::new(0.75, 0.9, 0.9),
            ambient: 0.2,
            diffuse_color: Vec3::splat(0.75),
            diffuse: 0.6,
            specular_color: Vec3::splat(0.8),
            specular: 0.2,
            specular_power: 4.0,
        }
    }
}

/// GPU layout of the per-object block used by the voxel pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VoxelObjectUniform {
    pub world: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub specular_power: f32,
    pub _pad: [f32; 3],
}

/// A voxel grid placed in the scene, with its CPU-side mesh.
///
/// The mesh is rebuilt whenever the grid is replaced or edited; `revision`
/// tells GPU renderers when to re-upload. The world matrix is computed on
/// first use after the transform changes.
#[derive(Debug)]
pub struct VoxelWorld {
    grid: VoxelGrid,
    mesh: Vec<MeshVertex>,
    revision: u64,
    position: Vec3,
    scale: f32,
    pub material: Material,
    world_matrix: Cell<Option<Mat4>>,
}

impl VoxelWorld {
    pub fn new(grid: VoxelGrid, scale: f32) -> Self {
        let mesh = VoxelMeshBuilder::new().build(&grid);
        tracing::debug!(
            dims = ?grid.dims(),
            vertices = mesh.len(),
            "voxel world meshed"
        );
        Self {
            grid,
            mesh,
            revision: 1,
            position: Vec3::ZERO,
            scale,
            material: Material::default(),
            world_matrix: Cell::new(None),
        }
    }

    /// Build the world described by the `World.*` keys.
    ///
    /// With `World.File` set the grid is read from that file and
    /// `World.SizeX/SizeY/SizeZ` are required. Without it a terrain of the
    /// configured (or default) size is generated.
    pub fn from_config(config: &Config) -> Result<Self, WorldLoadError> {
        let scale = config.get_float_or_default("World.Scale", 1.0)? as f32;
        let grid = if config.contains("World.File") {
            let path = config.get_string("World.File")?;
            let dims = GridDimensions::new(
                axis_required(config, "World.SizeX")?,
                axis_required(config, "World.SizeY")?,
                axis_required(config, "World.SizeZ")?,
            );
            load_world_file(path, dims)?
        } else {
            let d = DEFAULT_TERRAIN_SIZE;
            let dims = GridDimensions::new(
                axis(config, "World.SizeX", d.x)?,
                axis(config, "World.SizeY", d.y)?,
                axis(config, "World.SizeZ", d.z)?,
            );
            tracing::info!(?dims, "no world file configured, generating terrain");
            terrain_grid(dims)?
        };
        Ok(Self::new(grid, scale))
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn mesh(&self) -> &[MeshVertex] {
        &self.mesh
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats::of(&self.grid, &self.mesh)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn replace_grid(&mut self, grid: VoxelGrid) {
        self.grid = grid;
        self.remesh();
    }

    /// Set one cell and rebuild the mesh.
    pub fn set_cell(&mut self, x: usize, y: usize, z: usize, occupied: bool) -> Result<(), VoxelError> {
        self.grid.set(x, y, z, occupied)?;
        self.remesh();
        Ok(())
    }

    fn remesh(&mut self) {
        self.mesh = VoxelMeshBuilder::new().build(&self.grid);
        self.revision += 1;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.world_matrix.set(None);
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.world_matrix.set(None);
    }

    pub fn world_matrix(&self) -> Mat4 {
        if let Some(m) = self.world_matrix.get() {
            return m;
        }
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            glam::Quat::IDENTITY,
            self.position,
        );
        self.world_matrix.set(Some(m));
        m
    }

    pub fn to_uniform(&self) -> VoxelObjectUniform {
        let m = &self.material;
        VoxelObjectUniform {
            world: self.world_matrix().to_cols_array_2d(),
            ambient: m.ambient_color.extend(m.ambient).to_array(),
            diffuse: m.diffuse_color.extend(m.diffuse).to_array(),
            specular: m.specular_color.extend(m.specular).to_array(),
            specular_power: m.specular_power,
            _pad: [0.0; 3],
        }
    }
}
