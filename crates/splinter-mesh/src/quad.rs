//! Face culling and greedy rectangle merging for one face direction.
//!
//! Each direction sweeps the grid independently and owns exactly one face bit
//! per voxel in the scratch grid. That bit is used twice:
//!
//! 1. after culling, a set bit means the face is hidden by an occupied neighbor;
//! 2. during merging, a set bit means the face is already covered by a quad.
//!
//! A visible face always starts the merge phase with its bit clear, so the two
//! meanings never overlap for a face that can be drawn.

use glam::{IVec3, UVec3, Vec3};
use splinter_core::{CancelToken, Color, FaceDirection, VoxelCode, VoxelGrid};

/// In-plane axes a quad grows along for one face direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FacePlane {
    /// Axis the face is perpendicular to.
    pub normal: usize,
    /// Axis of the first (width) run.
    pub primary: usize,
    /// Axis of the second (height) run.
    pub secondary: usize,
}

impl FacePlane {
    /// Z faces grow along x then y, Y faces along x then z, X faces along y then z.
    pub const fn of(direction: FaceDirection) -> Self {
        match direction.axis() {
            0 => Self {
                normal: 0,
                primary: 1,
                secondary: 2,
            },
            1 => Self {
                normal: 1,
                primary: 0,
                secondary: 2,
            },
            _ => Self {
                normal: 2,
                primary: 0,
                secondary: 1,
            },
        }
    }
}

#[inline]
fn unit(axis: usize) -> IVec3 {
    let mut v = IVec3::ZERO;
    v[axis] = 1;
    v
}

/// One merged rectangle of coplanar, same-colored faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quad {
    pub direction: FaceDirection,
    /// Seed cell, the minimum corner of the covered rectangle.
    pub cell: UVec3,
    /// Cells covered along the primary axis.
    pub width: u32,
    /// Cells covered along the secondary axis.
    pub height: u32,
    pub color: Color,
}

impl Quad {
    /// Number of unit faces this quad covers.
    #[inline]
    pub const fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Offset of each corner from the seed cell's minimum corner, in corner
    /// order `(lo, lo), (hi, lo), (hi, hi), (lo, hi)` over (primary, secondary).
    pub fn corner_stretches(&self) -> [UVec3; 4] {
        let plane = FacePlane::of(self.direction);
        let mut base = UVec3::ZERO;
        if self.direction.is_positive() {
            base[plane.normal] = 1;
        }
        let mut w = UVec3::ZERO;
        w[plane.primary] = self.width;
        let mut h = UVec3::ZERO;
        h[plane.secondary] = self.height;
        [base, base + w, base + w + h, base + h]
    }

    /// Mesh-space positions of the four corners.
    ///
    /// Cell `(x, y, z)` spans `(x-1, y-1, z-1)..(x, y, z)`.
    pub fn corners(&self) -> [Vec3; 4] {
        let low = self.cell.as_vec3() - Vec3::ONE;
        self.corner_stretches().map(|s| low + s.as_vec3())
    }

    /// Whether triangles `(0, 1, 2), (0, 2, 3)` face outward for this
    /// direction. Otherwise the reversed order does.
    pub fn winds_forward(direction: FaceDirection) -> bool {
        let plane = FacePlane::of(direction);
        let facing = unit(plane.primary)
            .as_vec3()
            .cross(unit(plane.secondary).as_vec3());
        facing.dot(direction.normal()) > 0.0
    }

    /// Local triangle indices into the four corners, outward winding.
    pub fn triangle_order(direction: FaceDirection) -> [u32; 6] {
        if Self::winds_forward(direction) {
            [0, 1, 2, 0, 2, 3]
        } else {
            [0, 2, 1, 0, 3, 2]
        }
    }

    /// Cells covered by this quad.
    pub fn cells(&self) -> impl Iterator<Item = UVec3> + '_ {
        let plane = FacePlane::of(self.direction);
        (0..self.height).flat_map(move |j| {
            (0..self.width).map(move |i| {
                let mut cell = self.cell;
                cell[plane.primary] += i;
                cell[plane.secondary] += j;
                cell
            })
        })
    }
}

#[inline]
fn mergeable(grid: &VoxelGrid, pos: IVec3, seed: VoxelCode, direction: FaceDirection) -> bool {
    let code = grid.get(pos);
    code.color_eq(seed) && !code.has_face(direction)
}

/// Cells from `start` (inclusive) along `step` that can join a quad seeded by `seed`.
fn run_length(
    grid: &VoxelGrid,
    start: IVec3,
    step: IVec3,
    seed: VoxelCode,
    direction: FaceDirection,
) -> i32 {
    let mut run = 1;
    while mergeable(grid, start + step * run, seed, direction) {
        run += 1;
    }
    run
}

/// Cull and merge the faces of one direction into `out`.
///
/// `scratch` must be a copy the caller owns. Returns the number of visible unit
/// faces, or `None` if `cancel` fired between slices.
pub(crate) fn merge_direction(
    scratch: &mut VoxelGrid,
    direction: FaceDirection,
    cancel: Option<&CancelToken>,
    out: &mut Vec<Quad>,
) -> Option<usize> {
    let size = scratch.size();
    let offset = direction.offset();

    // Reset, then cull.
    let mut exposed = 0;
    for i in 0..scratch.len() {
        let code = scratch.codes()[i];
        if code.is_empty() {
            continue;
        }
        let neighbor = scratch.position(i).as_ivec3() + offset;
        let hidden = scratch.is_occupied(neighbor);
        scratch.codes_mut()[i] = if hidden {
            code.with_face(direction)
        } else {
            exposed += 1;
            code.without_face(direction)
        };
    }

    let plane = FacePlane::of(direction);
    let primary = unit(plane.primary);
    let secondary = unit(plane.secondary);

    for z in 0..size.z {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return None;
        }
        for y in 0..size.y {
            for x in 0..size.x {
                let cell = UVec3::new(x, y, z);
                let seed = scratch.codes()[scratch.index(cell)];
                if seed.is_empty() || seed.has_face(direction) {
                    continue;
                }
                let origin = cell.as_ivec3();

                let width = run_length(scratch, origin, primary, seed, direction);
                let mut height = run_length(scratch, origin, secondary, seed, direction);
                for i in 1..width {
                    let start = origin + primary * i;
                    let run = run_length(scratch, start, secondary, seed, direction);
                    if run < height {
                        height = run;
                    }
                }

                for j in 0..height {
                    for i in 0..width {
                        let pos = origin + primary * i + secondary * j;
                        let code = scratch.get(pos);
                        debug_assert!(
                            code.is_occupied() && !code.has_face(direction),
                            "cell {pos} is hidden or already merged for {direction:?}"
                        );
                        scratch.set(pos, code.with_face(direction));
                    }
                }

                out.push(Quad {
                    direction,
                    cell,
                    width: width as u32,
                    height: height as u32,
                    color: seed.color(),
                });
            }
        }
    }

    Some(exposed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(x: u32, y: u32, z: u32, color: Color) -> VoxelGrid {
        let mut grid = VoxelGrid::new(x, y, z);
        grid.fill_box(
            IVec3::ZERO,
            grid.size().as_ivec3() - IVec3::ONE,
            VoxelCode::from_color(color),
        );
        grid
    }

    #[test]
    fn planes_match_axes() {
        for direction in FaceDirection::ALL {
            let plane = FacePlane::of(direction);
            assert_eq!(plane.normal, direction.axis());
            assert_ne!(plane.primary, plane.secondary);
            assert_ne!(plane.primary, plane.normal);
            assert_ne!(plane.secondary, plane.normal);
        }
    }

    #[test]
    fn fixed_winding_per_direction() {
        assert!(Quad::winds_forward(FaceDirection::Front));
        assert!(Quad::winds_forward(FaceDirection::Right));
        assert!(!Quad::winds_forward(FaceDirection::Above));
        assert!(!Quad::winds_forward(FaceDirection::Back));
        assert!(!Quad::winds_forward(FaceDirection::Left));
        assert!(Quad::winds_forward(FaceDirection::Below));
    }

    #[test]
    fn single_voxel_corners_use_offset_convention() {
        let quad = Quad {
            direction: FaceDirection::Front,
            cell: UVec3::new(2, 0, 0),
            width: 1,
            height: 1,
            color: Color::WHITE,
        };
        assert_eq!(
            quad.corners(),
            [
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(2.0, -1.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ]
        );

        let back = Quad {
            direction: FaceDirection::Back,
            ..quad
        };
        assert!(back.corners().iter().all(|c| c.z == -1.0));
    }

    #[test]
    fn slab_top_merges_into_one_quad() {
        let mut grid = solid(4, 1, 3, Color::WHITE);
        let mut quads = Vec::new();
        let exposed = merge_direction(&mut grid, FaceDirection::Above, None, &mut quads).unwrap();
        assert_eq!(exposed, 12);
        assert_eq!(quads.len(), 1);
        assert_eq!((quads[0].width, quads[0].height), (4, 3));
        assert_eq!(quads[0].cells().count(), 12);
    }

    #[test]
    fn color_change_splits_runs() {
        let mut grid = solid(3, 1, 1, Color::WHITE);
        grid.set(IVec3::new(1, 0, 0), VoxelCode::from_color(Color::BLACK));
        let mut quads = Vec::new();
        merge_direction(&mut grid, FaceDirection::Front, None, &mut quads);
        assert_eq!(quads.len(), 3);
        assert!(quads.iter().all(|q| q.area() == 1));
    }

    #[test]
    fn secondary_extent_is_the_minimum_run() {
        // Rows along x: y=0 has 3 cells, y=1 has only the first 2.
        let code = VoxelCode::from_color(Color::WHITE);
        let mut grid = VoxelGrid::new(3, 2, 1);
        grid.fill_box(IVec3::ZERO, IVec3::new(2, 0, 0), code);
        grid.fill_box(IVec3::new(0, 1, 0), IVec3::new(1, 1, 0), code);

        let mut quads = Vec::new();
        merge_direction(&mut grid, FaceDirection::Front, None, &mut quads);
        // Seed (0,0): width 3, runs along y are 2, 2, 1 -> height 1.
        assert_eq!((quads[0].width, quads[0].height), (3, 1));
        assert_eq!((quads[1].cell, quads[1].width, quads[1].height), (UVec3::new(0, 1, 0), 2, 1));
        assert_eq!(quads.len(), 2);
    }

    #[test]
    fn cancelled_merge_returns_none() {
        let token = CancelToken::new();
        token.cancel();
        let mut grid = solid(2, 2, 2, Color::WHITE);
        let mut quads = Vec::new();
        let exposed = merge_direction(&mut grid, FaceDirection::Right, Some(&token), &mut quads);
        assert!(exposed.is_none());
    }
}
