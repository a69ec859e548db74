//! Dense voxel grid.

use glam::{IVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::VoxelCode;

/// Serialized form of a grid. Validated on the way back in.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawGrid {
    size: [u32; 3],
    codes: Vec<u32>,
}

/// A dense 3D array of voxel codes, x fastest, then y, then z.
///
/// Reads outside the grid return [`VoxelCode::EMPTY`] and writes outside the
/// grid are ignored, so neighbor lookups never need their own bounds checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid", into = "RawGrid")]
pub struct VoxelGrid {
    size: UVec3,
    codes: Vec<VoxelCode>,
}

impl TryFrom<RawGrid> for VoxelGrid {
    type Error = Error;

    fn try_from(raw: RawGrid) -> Result<Self> {
        Self::from_raw(UVec3::from_array(raw.size), &raw.codes)
    }
}

impl From<VoxelGrid> for RawGrid {
    fn from(grid: VoxelGrid) -> Self {
        Self {
            size: grid.size.to_array(),
            codes: grid.to_flat_array(),
        }
    }
}

impl VoxelGrid {
    /// Create an all-empty grid.
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        let size = UVec3::new(x, y, z);
        Self {
            size,
            codes: vec![VoxelCode::EMPTY; Self::volume(size)],
        }
    }

    /// Create a grid from already-packed codes.
    pub fn from_codes(size: UVec3, codes: Vec<VoxelCode>) -> Result<Self> {
        let expected = Self::volume(size);
        if codes.len() != expected {
            return Err(Error::InvalidData(format!(
                "grid of size {size} needs {expected} codes, got {}",
                codes.len()
            )));
        }
        Ok(Self { size, codes })
    }

    /// Create a grid from an external buffer of raw codes.
    pub fn from_raw(size: UVec3, raw: &[u32]) -> Result<Self> {
        Self::from_codes(size, raw.iter().copied().map(VoxelCode::from_raw).collect())
    }

    #[inline]
    fn volume(size: UVec3) -> usize {
        size.x as usize * size.y as usize * size.z as usize
    }

    /// Grid dimensions.
    #[inline]
    pub const fn size(&self) -> UVec3 {
        self.size
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Linear index of an in-bounds cell.
    #[inline]
    pub fn index(&self, pos: UVec3) -> usize {
        debug_assert!(pos.cmplt(self.size).all());
        let (sx, sy) = (self.size.x as usize, self.size.y as usize);
        pos.x as usize + sx * (pos.y as usize + sy * pos.z as usize)
    }

    /// Linear index of a cell, or `None` if it lies outside the grid.
    #[inline]
    pub fn index_checked(&self, pos: IVec3) -> Option<usize> {
        self.is_in_bounds(pos).then(|| self.index(pos.as_uvec3()))
    }

    /// Cell coordinates of a linear index.
    #[inline]
    pub fn position(&self, index: usize) -> UVec3 {
        let sx = self.size.x as usize;
        let sy = self.size.y as usize;
        UVec3::new(
            (index % sx) as u32,
            ((index / sx) % sy) as u32,
            (index / (sx * sy)) as u32,
        )
    }

    /// Returns true if the cell lies inside the grid.
    #[inline]
    pub fn is_in_bounds(&self, pos: IVec3) -> bool {
        pos.cmpge(IVec3::ZERO).all() && pos.as_uvec3().cmplt(self.size).all()
    }

    /// Code at a cell. Out-of-bounds cells are empty.
    #[inline]
    pub fn get(&self, pos: IVec3) -> VoxelCode {
        self.index_checked(pos)
            .map_or(VoxelCode::EMPTY, |i| self.codes[i])
    }

    /// Store a code at a cell. Returns false (and does nothing) when the cell
    /// is out of bounds.
    #[inline]
    pub fn set(&mut self, pos: IVec3, code: VoxelCode) -> bool {
        match self.index_checked(pos) {
            Some(i) => {
                self.codes[i] = code;
                true
            }
            None => false,
        }
    }

    /// Returns true if the cell holds a voxel.
    #[inline]
    pub fn is_occupied(&self, pos: IVec3) -> bool {
        self.get(pos).is_occupied()
    }

    /// All codes in linear order.
    #[inline]
    pub fn codes(&self) -> &[VoxelCode] {
        &self.codes
    }

    /// Mutable access to all codes in linear order.
    #[inline]
    pub fn codes_mut(&mut self) -> &mut [VoxelCode] {
        &mut self.codes
    }

    /// Codes in linear order without face state, for export.
    pub fn to_flat_array(&self) -> Vec<u32> {
        self.codes.iter().map(|&c| u32::from(c)).collect()
    }

    /// Raw bytes of the code buffer, face state included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.codes)
    }

    /// Independent deep copy.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Release the code buffer. The grid is zero-sized afterwards.
    pub fn dispose(&mut self) {
        self.codes = Vec::new();
        self.size = UVec3::ZERO;
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.codes.iter().filter(|c| c.is_occupied()).count()
    }

    /// Returns true if no cell is occupied.
    pub fn is_empty(&self) -> bool {
        !self.codes.iter().any(|c| c.is_occupied())
    }

    /// Clear face state on every cell.
    pub fn clear_face_flags(&mut self) {
        for code in &mut self.codes {
            *code = code.without_faces();
        }
    }

    /// Inclusive cell bounds of the occupied region.
    pub fn occupied_bounds(&self) -> Option<(UVec3, UVec3)> {
        self.iter_occupied().fold(None, |acc, (pos, _)| match acc {
            None => Some((pos, pos)),
            Some((min, max)) => Some((min.min(pos), max.max(pos))),
        })
    }

    /// Iterate occupied cells in linear order.
    pub fn iter_occupied(&self) -> impl Iterator<Item = (UVec3, VoxelCode)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_occupied())
            .map(|(i, &c)| (self.position(i), c))
    }

    /// Fill an inclusive box of cells, clipped to the grid.
    pub fn fill_box(&mut self, min: IVec3, max: IVec3, code: VoxelCode) {
        let lo = min.max(IVec3::ZERO);
        let hi = max.min(self.size.as_ivec3() - IVec3::ONE);
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    self.set(IVec3::new(x, y, z), code);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, FaceDirection};

    fn red() -> VoxelCode {
        VoxelCode::from_color(Color::new(255, 0, 0))
    }

    #[test]
    fn new_grid_is_empty() {
        let grid = VoxelGrid::new(4, 3, 2);
        assert_eq!(grid.size(), UVec3::new(4, 3, 2));
        assert_eq!(grid.len(), 24);
        assert!(grid.is_empty());
        assert_eq!(grid.occupied_bounds(), None);
    }

    #[test]
    fn out_of_bounds_reads_are_empty() {
        let mut grid = VoxelGrid::new(2, 2, 2);
        grid.fill_box(IVec3::ZERO, IVec3::ONE, red());
        assert!(grid.get(IVec3::new(-1, 0, 0)).is_empty());
        assert!(grid.get(IVec3::new(0, 2, 0)).is_empty());
        assert!(grid.get(IVec3::new(0, 0, i32::MAX)).is_empty());
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut grid = VoxelGrid::new(2, 2, 2);
        assert!(!grid.set(IVec3::new(2, 0, 0), red()));
        assert!(!grid.set(IVec3::new(0, -1, 0), red()));
        assert!(grid.is_empty());
        assert!(grid.set(IVec3::new(1, 1, 1), red()));
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn index_layout_is_x_fastest() {
        let grid = VoxelGrid::new(4, 3, 2);
        assert_eq!(grid.index(UVec3::new(1, 0, 0)), 1);
        assert_eq!(grid.index(UVec3::new(0, 1, 0)), 4);
        assert_eq!(grid.index(UVec3::new(0, 0, 1)), 12);
        for i in 0..grid.len() {
            assert_eq!(grid.index(grid.position(i)), i);
        }
    }

    #[test]
    fn from_codes_checks_length() {
        let err = VoxelGrid::from_codes(UVec3::new(2, 2, 2), vec![VoxelCode::EMPTY; 7]);
        assert!(matches!(err, Err(Error::InvalidData(_))));
    }

    #[test]
    fn copy_is_independent() {
        let mut grid = VoxelGrid::new(2, 1, 1);
        grid.set(IVec3::ZERO, red());
        let mut copy = grid.copy();
        copy.set(IVec3::ZERO, VoxelCode::EMPTY);
        assert!(grid.is_occupied(IVec3::ZERO));
        assert!(!copy.is_occupied(IVec3::ZERO));
    }

    #[test]
    fn dispose_releases_storage() {
        let mut grid = VoxelGrid::new(3, 3, 3);
        grid.dispose();
        assert_eq!(grid.size(), UVec3::ZERO);
        assert_eq!(grid.len(), 0);
        assert!(grid.get(IVec3::ZERO).is_empty());
    }

    #[test]
    fn export_drops_face_state() {
        let mut grid = VoxelGrid::new(1, 1, 1);
        grid.set(IVec3::ZERO, red().with_face(FaceDirection::Above));
        assert_eq!(grid.to_flat_array(), vec![red().raw()]);
        assert_eq!(grid.as_bytes().len(), 4);
        grid.clear_face_flags();
        assert_eq!(grid.get(IVec3::ZERO), red());
    }

    #[test]
    fn occupied_bounds_cover_voxels() {
        let mut grid = VoxelGrid::new(5, 5, 5);
        grid.set(IVec3::new(1, 3, 2), red());
        grid.set(IVec3::new(4, 0, 2), red());
        assert_eq!(
            grid.occupied_bounds(),
            Some((UVec3::new(1, 0, 2), UVec3::new(4, 3, 2)))
        );
    }

    #[test]
    fn serde_roundtrip_validates() {
        let mut grid = VoxelGrid::new(2, 2, 1);
        grid.set(IVec3::new(1, 1, 0), red());
        let bytes = bincode::serialize(&grid).unwrap();
        let back: VoxelGrid = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, grid);

        let bad = RawGrid {
            size: [2, 2, 2],
            codes: vec![0; 3],
        };
        let bytes = bincode::serialize(&bad).unwrap();
        assert!(bincode::deserialize::<VoxelGrid>(&bytes).is_err());
    }
}
