use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest extent allowed on any axis.
pub const MAX_WORLD_SIZE: usize = 100;

/// Occupancy bit of a cell.
pub const OCCUPIED: u8 = 0x01;

#[derive(Debug, thiserror::Error)]
pub enum VoxelError {
    #[error("cell ({x}, {y}, {z}) is outside a grid of size {size:?}")]
    OutOfBounds {
        x: usize,
        y: usize,
        z: usize,
        size: GridDimensions,
    },
    #[error("world data has {actual} bytes, expected {expected}")]
    InvalidWorldData { expected: usize, actual: usize },
    #[error("grid size {size:?} exceeds the maximum of {max} per axis")]
    TooLarge { size: GridDimensions, max: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extent of a grid along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridDimensions {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridDimensions {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub const fn cell_count(&self) -> usize {
        self.x * self.y * self.z
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.x && y < self.y && z < self.z
    }

    /// Linear offset of a cell: y-major, then z, then x.
    pub const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (self.x * self.z) * y + self.x * z + x
    }

    fn validate(self) -> Result<Self, VoxelError> {
        if self.x > MAX_WORLD_SIZE || self.y > MAX_WORLD_SIZE || self.z > MAX_WORLD_SIZE {
            return Err(VoxelError::TooLarge {
                size: self,
                max: MAX_WORLD_SIZE,
            });
        }
        Ok(self)
    }
}

/// Dense 3D grid of cell bitfields.
///
/// The length of the cell buffer always equals `dims.cell_count()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    dims: GridDimensions,
    cells: Vec<u8>,
}

impl VoxelGrid {
    /// An all-empty grid. Any axis may be zero.
    pub fn new(dims: GridDimensions) -> Result<Self, VoxelError> {
        let dims = dims.validate()?;
        Ok(Self {
            dims,
            cells: vec![0; dims.cell_count()],
        })
    }

    /// Wrap raw cell bytes laid out in world-file order.
    pub fn from_bytes(dims: GridDimensions, bytes: Vec<u8>) -> Result<Self, VoxelError> {
        let dims = dims.validate()?;
        if bytes.len() != dims.cell_count() {
            return Err(VoxelError::InvalidWorldData {
                expected: dims.cell_count(),
                actual: bytes.len(),
            });
        }
        Ok(Self { dims, cells: bytes })
    }

    /// Build a grid by asking `occupied` about every cell.
    pub fn from_fn(
        dims: GridDimensions,
        mut occupied: impl FnMut(usize, usize, usize) -> bool,
    ) -> Result<Self, VoxelError> {
        let mut grid = Self::new(dims)?;
        for y in 0..dims.y {
            for z in 0..dims.z {
                for x in 0..dims.x {
                    if occupied(x, y, z) {
                        let i = dims.index(x, y, z);
                        grid.cells[i] = OCCUPIED;
                    }
                }
            }
        }
        Ok(grid)
    }

    pub fn dims(&self) -> GridDimensions {
        self.dims
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Raw cell bitfield at a coordinate.
    pub fn at(&self, x: usize, y: usize, z: usize) -> Result<u8, VoxelError> {
        let i = self.checked_index(x, y, z)?;
        Ok(self.cells[i])
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, occupied: bool) -> Result<(), VoxelError> {
        let i = self.checked_index(x, y, z)?;
        if occupied {
            self.cells[i] |= OCCUPIED;
        } else {
            self.cells[i] &= !OCCUPIED;
        }
        Ok(())
    }

    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> Result<bool, VoxelError> {
        Ok(self.at(x, y, z)? & OCCUPIED != 0)
    }

    /// Occupancy of a possibly out-of-range neighbour; anything outside the grid is empty.
    pub fn neighbor_occupied(&self, x: isize, y: isize, z: isize) -> bool {
        if x < 0 || y < 0 || z < 0 {
            return false;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        self.dims.contains(x, y, z) && self.cells[self.dims.index(x, y, z)] & OCCUPIED != 0
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| *c & OCCUPIED != 0).count()
    }

    /// Number of faces of occupied cells whose neighbour is absent.
    pub fn exposed_face_count(&self) -> usize {
        let mut faces = 0;
        for (x, y, z) in self.occupied_cells() {
            let (x, y, z) = (x as isize, y as isize, z as isize);
            for (dx, dy, dz) in NEIGHBOR_OFFSETS {
                if !self.neighbor_occupied(x + dx, y + dy, z + dz) {
                    faces += 1;
                }
            }
        }
        faces
    }

    /// Coordinates of occupied cells in traversal order (y, then z, then x).
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let d = self.dims;
        (0..d.y).flat_map(move |y| {
            (0..d.z).flat_map(move |z| {
                (0..d.x).filter_map(move |x| {
                    (self.cells[d.index(x, y, z)] & OCCUPIED != 0).then_some((x, y, z))
                })
            })
        })
    }

    fn checked_index(&self, x: usize, y: usize, z: usize) -> Result<usize, VoxelError> {
        if !self.dims.contains(x, y, z) {
            return Err(VoxelError::OutOfBounds {
                x,
                y,
                z,
                size: self.dims,
            });
        }
        Ok(self.dims.index(x, y, z))
    }
}

const NEIGHBOR_OFFSETS: [(isize, isize, isize); 6] = [
    (-1, 0, 0),
    (0, -1, 0),
    (0, 0, -1),
    (1, 0, 0),
    (0, 1, 0),
    (0, 0, 1),
];

/// Load a headerless world file: one byte per cell, y outer, z middle, x inner.
pub fn load_world_file(path: impl AsRef<Path>, dims: GridDimensions) -> Result<VoxelGrid, VoxelError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let grid = VoxelGrid::from_bytes(dims, bytes)?;
    tracing::debug!(
        path = %path.display(),
        ?dims,
        occupied = grid.occupied_count(),
        "world file loaded"
    );
    Ok(grid)
}
