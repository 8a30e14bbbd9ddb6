use cubeworld_voxel::{GridDimensions, VoxelGrid, VoxelMeshBuilder, decode};
use proptest::prelude::*;

fn grid_strategy() -> impl Strategy<Value = VoxelGrid> {
    (0usize..6, 0usize..6, 0usize..6).prop_flat_map(|(x, y, z)| {
        let dims = GridDimensions::new(x, y, z);
        proptest::collection::vec(0u8..2, dims.cell_count()).prop_map(move |cells| {
            VoxelGrid::from_bytes(dims, cells).expect("dimensions within limits")
        })
    })
}

proptest! {
    // Every exposed face contributes exactly one six-vertex quad.
    #[test]
    fn vertices_are_six_per_exposed_face(grid in grid_strategy()) {
        let verts = VoxelMeshBuilder::new().build(&grid);
        prop_assert_eq!(verts.len(), 6 * grid.exposed_face_count());
        prop_assert!(verts.len() <= 36 * grid.occupied_count());
    }

    // Each quad's codes decode to a single face, and that face really is exposed.
    #[test]
    fn emitted_faces_border_empty_cells(grid in grid_strategy()) {
        let dims = grid.dims();
        let verts = VoxelMeshBuilder::new().build(&grid);
        for quad in verts.chunks(6) {
            let (_, face, _) = decode(quad[0].code).unwrap();
            for v in quad {
                prop_assert_eq!(decode(v.code).unwrap().1, face);
                prop_assert_eq!(v.center, quad[0].center);
            }
            let cx = (quad[0].center[0] + dims.x as f32 * 0.5 - 0.5).round() as isize;
            let cy = (quad[0].center[1] + dims.y as f32 * 0.5 - 0.5).round() as isize;
            let cz = (quad[0].center[2] + dims.z as f32 * 0.5 - 0.5).round() as isize;
            let (dx, dy, dz) = face.delta();
            prop_assert!(grid.neighbor_occupied(cx, cy, cz));
            prop_assert!(!grid.neighbor_occupied(cx + dx, cy + dy, cz + dz));
        }
    }

    // Building twice yields identical output.
    #[test]
    fn build_is_deterministic(grid in grid_strategy()) {
        let a = VoxelMeshBuilder::new().build(&grid);
        let b = VoxelMeshBuilder::new().build(&grid);
        prop_assert_eq!(a, b);
    }

    // A fully occupied box only shows its outer shell.
    #[test]
    fn solid_box_shows_only_its_surface(x in 1usize..7, y in 1usize..7, z in 1usize..7) {
        let grid = VoxelGrid::from_fn(GridDimensions::new(x, y, z), |_, _, _| true).unwrap();
        let verts = VoxelMeshBuilder::new().build(&grid);
        let surface = 2 * (x * y + y * z + x * z);
        prop_assert_eq!(verts.len(), 6 * surface);
    }
}
