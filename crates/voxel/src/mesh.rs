//! Face-culled cube mesh generation.
//!
//! Every exposed face of an occupied cell becomes two triangles (six
//! non-indexed vertices). Vertices carry only the cube centre and a packed
//! code; the vertex shader rebuilds the corner offset, face normal and
//! texture coordinate from the code.
//!
//! # Vertex code layout
//!
//! | bits | field |
//! |------|-------|
//! | 0..3 | [`CubeCorner`] (bit 2 = +x, bit 1 = +y, bit 0 = +z) |
//! | 3..6 | [`CubeFace`] |
//! | 6..8 | [`QuadCorner`] |
//!
//! The layout is shared with the voxel WGSL shader and must not change.
//!
//! Each face template lists its two triangles clockwise when viewed from
//! outside the cube (right-handed, +Y up).

use crate::grid::VoxelGrid;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

/// One of the eight corners of a unit cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CubeCorner {
    NxNyNz = 0,
    NxNyPz = 1,
    NxPyNz = 2,
    NxPyPz = 3,
    PxNyNz = 4,
    PxNyPz = 5,
    PxPyNz = 6,
    PxPyPz = 7,
}

impl CubeCorner {
    pub const ALL: [CubeCorner; 8] = [
        Self::NxNyNz,
        Self::NxNyPz,
        Self::NxPyNz,
        Self::NxPyPz,
        Self::PxNyNz,
        Self::PxNyPz,
        Self::PxPyNz,
        Self::PxPyPz,
    ];

    /// Offset of the corner from the cube centre, for a cube of edge 1.
    pub fn offset(self) -> Vec3 {
        let bits = self as u8;
        let axis = |bit: u8| if bits & bit != 0 { 0.5 } else { -0.5 };
        Vec3::new(axis(0b100), axis(0b010), axis(0b001))
    }
}

/// Axis-aligned face of a cube, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CubeFace {
    NegX = 0,
    NegY = 1,
    NegZ = 2,
    PosX = 3,
    PosY = 4,
    PosZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        Self::NegX,
        Self::NegY,
        Self::NegZ,
        Self::PosX,
        Self::PosY,
        Self::PosZ,
    ];

    /// Grid step across this face.
    pub fn delta(self) -> (isize, isize, isize) {
        match self {
            Self::NegX => (-1, 0, 0),
            Self::NegY => (0, -1, 0),
            Self::NegZ => (0, 0, -1),
            Self::PosX => (1, 0, 0),
            Self::PosY => (0, 1, 0),
            Self::PosZ => (0, 0, 1),
        }
    }

    pub fn normal(self) -> Vec3 {
        let (x, y, z) = self.delta();
        Vec3::new(x as f32, y as f32, z as f32)
    }
}

/// Texture-space corner of a face quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QuadCorner {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl QuadCorner {
    /// Texture coordinate as `[u, v]`: u grows to the right, v grows downward.
    ///
    /// Bit 0 of the discriminant is u and bit 1 is v, which is how the voxel
    /// shader decodes the packed corner.
    pub fn uv(self) -> [f32; 2] {
        match self {
            Self::TopLeft => [0.0, 0.0],
            Self::TopRight => [1.0, 0.0],
            Self::BottomLeft => [0.0, 1.0],
            Self::BottomRight => [1.0, 1.0],
        }
    }
}

const CORNER_MASK: u32 = 0b111;
const FACE_SHIFT: u32 = 3;
const FACE_MASK: u32 = 0b111;
const QUAD_SHIFT: u32 = 6;
const QUAD_MASK: u32 = 0b11;

/// Pack a vertex descriptor.
pub const fn encode(corner: CubeCorner, face: CubeFace, quad: QuadCorner) -> u32 {
    (corner as u32) | ((face as u32) << FACE_SHIFT) | ((quad as u32) << QUAD_SHIFT)
}

/// Unpack a vertex descriptor. Returns `None` for a face value above 5.
pub fn decode(code: u32) -> Option<(CubeCorner, CubeFace, QuadCorner)> {
    let corner = CubeCorner::ALL[(code & CORNER_MASK) as usize];
    let face = *CubeFace::ALL.get(((code >> FACE_SHIFT) & FACE_MASK) as usize)?;
    let quad = match (code >> QUAD_SHIFT) & QUAD_MASK {
        0 => QuadCorner::TopLeft,
        1 => QuadCorner::TopRight,
        2 => QuadCorner::BottomLeft,
        _ => QuadCorner::BottomRight,
    };
    Some((corner, face, quad))
}

use CubeCorner::*;
use QuadCorner::*;

const fn face_template(face: CubeFace, v: [(CubeCorner, QuadCorner); 6]) -> [u32; 6] {
    [
        encode(v[0].0, face, v[0].1),
        encode(v[1].0, face, v[1].1),
        encode(v[2].0, face, v[2].1),
        encode(v[3].0, face, v[3].1),
        encode(v[4].0, face, v[4].1),
        encode(v[5].0, face, v[5].1),
    ]
}

/// Vertex codes per face, indexed by `CubeFace as usize`.
pub const FACE_TEMPLATES: [[u32; 6]; 6] = [
    face_template(
        CubeFace::NegX,
        [
            (NxPyNz, TopRight),
            (NxPyPz, TopLeft),
            (NxNyPz, BottomLeft),
            (NxNyPz, BottomLeft),
            (NxNyNz, BottomRight),
            (NxPyNz, TopRight),
        ],
    ),
    face_template(
        CubeFace::NegY,
        [
            (PxNyNz, TopRight),
            (NxNyNz, TopLeft),
            (NxNyPz, BottomLeft),
            (NxNyPz, BottomLeft),
            (PxNyPz, BottomRight),
            (PxNyNz, TopRight),
        ],
    ),
    face_template(
        CubeFace::NegZ,
        [
            (PxPyNz, TopRight),
            (NxPyNz, TopLeft),
            (NxNyNz, BottomLeft),
            (NxNyNz, BottomLeft),
            (PxNyNz, BottomRight),
            (PxPyNz, TopRight),
        ],
    ),
    face_template(
        CubeFace::PosX,
        [
            (PxPyPz, TopRight),
            (PxPyNz, TopLeft),
            (PxNyNz, BottomLeft),
            (PxNyNz, BottomLeft),
            (PxNyPz, BottomRight),
            (PxPyPz, TopRight),
        ],
    ),
    face_template(
        CubeFace::PosY,
        [
            (PxPyPz, TopRight),
            (NxPyPz, TopLeft),
            (NxPyNz, BottomLeft),
            (NxPyNz, BottomLeft),
            (PxPyNz, BottomRight),
            (PxPyPz, TopRight),
        ],
    ),
    face_template(
        CubeFace::PosZ,
        [
            (NxPyPz, TopRight),
            (PxPyPz, TopLeft),
            (PxNyPz, BottomLeft),
            (PxNyPz, BottomLeft),
            (NxNyPz, BottomRight),
            (NxPyPz, TopRight),
        ],
    ),
];

/// GPU vertex: cube centre plus packed code.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub center: [f32; 3],
    pub code: u32,
}

impl MeshVertex {
    /// World-space position of the vertex for a cube of edge `scale`.
    pub fn position(&self, scale: f32) -> Option<Vec3> {
        let (corner, _, _) = decode(self.code)?;
        Some((Vec3::from_array(self.center) + corner.offset()) * scale)
    }
}

/// Summary of a built mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeshStats {
    pub cells: usize,
    pub occupied: usize,
    pub exposed_faces: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub bytes: usize,
}

impl MeshStats {
    pub fn of(grid: &VoxelGrid, vertices: &[MeshVertex]) -> Self {
        Self {
            cells: grid.dims().cell_count(),
            occupied: grid.occupied_count(),
            exposed_faces: vertices.len() / 6,
            vertices: vertices.len(),
            triangles: vertices.len() / 3,
            bytes: std::mem::size_of_val(vertices),
        }
    }
}

/// Builds the boundary mesh of a voxel grid.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoxelMeshBuilder;

impl VoxelMeshBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Emit six vertices for every face of an occupied cell whose neighbour
    /// is out of bounds or empty. Cube centres are relative to the grid centre.
    pub fn build(&self, grid: &VoxelGrid) -> Vec<MeshVertex> {
        let _span = tracing::debug_span!("voxel_mesh_build", dims = ?grid.dims()).entered();

        let dims = grid.dims();
        let half = Vec3::new(dims.x as f32, dims.y as f32, dims.z as f32) * 0.5;
        let mut vertices = Vec::new();

        for (x, y, z) in grid.occupied_cells() {
            let center = (Vec3::new(x as f32, y as f32, z as f32) - half + Vec3::splat(0.5))
                .to_array();
            let (ix, iy, iz) = (x as isize, y as isize, z as isize);
            for face in CubeFace::ALL {
                let (dx, dy, dz) = face.delta();
                if grid.neighbor_occupied(ix + dx, iy + dy, iz + dz) {
                    continue;
                }
                vertices.extend(
                    FACE_TEMPLATES[face as usize]
                        .iter()
                        .map(|&code| MeshVertex { center, code }),
                );
            }
        }

        tracing::debug!(
            occupied = grid.occupied_count(),
            vertices = vertices.len(),
            "voxel mesh built"
        );
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDimensions;

    fn single_cell() -> VoxelGrid {
        VoxelGrid::from_fn(GridDimensions::new(3, 3, 3), |x, y, z| (x, y, z) == (1, 1, 1)).unwrap()
    }

    #[test]
    fn quad_uv_is_u_right_v_down() {
        assert_eq!(QuadCorner::TopRight.uv(), [1.0, 0.0]);
        assert_eq!(QuadCorner::BottomLeft.uv(), [0.0, 1.0]);
        for corner in [
            QuadCorner::TopLeft,
            QuadCorner::TopRight,
            QuadCorner::BottomLeft,
            QuadCorner::BottomRight,
        ] {
            let bits = corner as u8;
            assert_eq!(corner.uv(), [f32::from(bits & 1), f32::from(bits >> 1)]);
        }
    }

    #[test]
    fn empty_grid_builds_nothing() {
        let grid = VoxelGrid::new(GridDimensions::new(4, 4, 4)).unwrap();
        assert!(VoxelMeshBuilder::new().build(&grid).is_empty());
        let zero = VoxelGrid::new(GridDimensions::new(0, 0, 0)).unwrap();
        assert!(VoxelMeshBuilder::new().build(&zero).is_empty());
    }

    #[test]
    fn single_cube_emits_all_six_faces() {
        let grid = single_cell();
        let verts = VoxelMeshBuilder::new().build(&grid);
        assert_eq!(verts.len(), 36);
        assert_eq!(grid.exposed_face_count(), 6);
        assert!(verts.iter().all(|v| v.center == [0.0, 0.0, 0.0]));

        let faces: Vec<CubeFace> = verts
            .chunks(6)
            .map(|quad| decode(quad[0].code).unwrap().1)
            .collect();
        assert_eq!(faces, CubeFace::ALL.to_vec());
    }

    #[test]
    fn adjacent_cubes_hide_shared_face() {
        let grid =
            VoxelGrid::from_fn(GridDimensions::new(2, 1, 1), |_, _, _| true).unwrap();
        let verts = VoxelMeshBuilder::new().build(&grid);
        assert_eq!(verts.len(), 60);

        let first_cell: Vec<CubeFace> = verts[..30]
            .chunks(6)
            .map(|quad| decode(quad[0].code).unwrap().1)
            .collect();
        assert!(!first_cell.contains(&CubeFace::PosX));
        assert_eq!(verts[0].center, [-0.5, 0.0, 0.0]);
        assert_eq!(verts[30].center, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn centres_are_relative_to_grid_centre() {
        let grid = VoxelGrid::from_fn(GridDimensions::new(4, 2, 6), |x, y, z| {
            (x, y, z) == (0, 0, 0)
        })
        .unwrap();
        let verts = VoxelMeshBuilder::new().build(&grid);
        assert_eq!(verts[0].center, [-1.5, -0.5, -2.5]);
    }

    #[test]
    fn codes_round_trip() {
        for corner in CubeCorner::ALL {
            for face in CubeFace::ALL {
                let code = encode(corner, face, QuadCorner::BottomRight);
                assert_eq!(code >> 8, 0);
                assert_eq!(decode(code), Some((corner, face, QuadCorner::BottomRight)));
            }
        }
        assert_eq!(decode(6 << FACE_SHIFT), None);
    }

    #[test]
    fn template_corners_lie_on_their_face() {
        for face in CubeFace::ALL {
            for &code in &FACE_TEMPLATES[face as usize] {
                let (corner, decoded_face, _) = decode(code).unwrap();
                assert_eq!(decoded_face, face);
                assert_eq!(corner.offset().dot(face.normal()), 0.5);
            }
        }
    }

    #[test]
    fn templates_wind_clockwise_from_outside() {
        for face in CubeFace::ALL {
            let corners: Vec<Vec3> = FACE_TEMPLATES[face as usize]
                .iter()
                .map(|&c| decode(c).unwrap().0.offset())
                .collect();
            for tri in corners.chunks(3) {
                let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
                assert!(
                    n.dot(face.normal()) < 0.0,
                    "{face:?} triangle is not clockwise from outside"
                );
            }
        }
    }

    #[test]
    fn vertex_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 16);
    }

    #[test]
    fn stats_count_faces() {
        let grid = single_cell();
        let verts = VoxelMeshBuilder::new().build(&grid);
        let stats = MeshStats::of(&grid, &verts);
        assert_eq!(stats.cells, 27);
        assert_eq!(stats.occupied, 1);
        assert_eq!(stats.exposed_faces, 6);
        assert_eq!(stats.triangles, 12);
        assert_eq!(stats.bytes, 36 * 16);
    }
}
