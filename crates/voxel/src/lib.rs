//! Voxel world geometry: a dense occupancy grid and its boundary mesh.
//!
//! # Invariants
//! - A grid's cell buffer length always equals `x * y * z`.
//! - Out-of-range access is an error, never clamped.
//! - Mesh building is a pure function of the grid: vertices = 6 x exposed faces.

pub mod grid;
pub mod mesh;

pub use grid::{GridDimensions, MAX_WORLD_SIZE, OCCUPIED, VoxelError, VoxelGrid, load_world_file};
pub use mesh::{
    CubeCorner, CubeFace, FACE_TEMPLATES, MeshStats, MeshVertex, QuadCorner, VoxelMeshBuilder,
    decode, encode,
};

pub fn crate_info() -> &'static str {
    "cubeworld-voxel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("voxel"));
    }
}
