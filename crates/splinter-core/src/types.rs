//! Packed voxel codes and face directions.
//!
//! A voxel is stored as one 32-bit code:
//!
//! ```text
//! 31      24 23      16 15       8  7   6   5        0
//! +---------+----------+----------+---+---+----------+
//! |   red   |  green   |   blue   | - | O | face bits|
//! +---------+----------+----------+---+---+----------+
//! ```
//!
//! `O` is the occupancy bit. A code of zero is an empty cell. The six face bits
//! are scratch space owned by whichever meshing or connectivity pass is running
//! and are never part of the color.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque RGB color of a voxel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Pure black. Still a valid, occupied voxel color.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new color
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// RGBA with full opacity, the layout mesh color buffers use.
    #[inline]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

bitflags! {
    /// Transient per-voxel face state, one bit per direction.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FaceFlags: u32 {
        /// +Z
        const FRONT = 0x01;
        /// +Y
        const ABOVE = 0x02;
        /// +X
        const RIGHT = 0x04;
        /// -X
        const LEFT = 0x08;
        /// -Z
        const BACK = 0x10;
        /// -Y
        const BELOW = 0x20;
    }
}

/// One of the six axis-aligned face directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceDirection {
    /// +Z
    Front,
    /// +Y
    Above,
    /// +X
    Right,
    /// -X
    Left,
    /// -Z
    Back,
    /// -Y
    Below,
}

impl FaceDirection {
    /// All directions, in flag-bit order.
    pub const ALL: [Self; 6] = [
        Self::Front,
        Self::Above,
        Self::Right,
        Self::Left,
        Self::Back,
        Self::Below,
    ];

    /// The face-state bit reserved for this direction.
    #[inline]
    pub const fn flag(self) -> FaceFlags {
        match self {
            Self::Front => FaceFlags::FRONT,
            Self::Above => FaceFlags::ABOVE,
            Self::Right => FaceFlags::RIGHT,
            Self::Left => FaceFlags::LEFT,
            Self::Back => FaceFlags::BACK,
            Self::Below => FaceFlags::BELOW,
        }
    }

    /// Position in [`Self::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Axis index the face is perpendicular to (0 = x, 1 = y, 2 = z).
    #[inline]
    pub const fn axis(self) -> usize {
        match self {
            Self::Right | Self::Left => 0,
            Self::Above | Self::Below => 1,
            Self::Front | Self::Back => 2,
        }
    }

    /// Whether the face points along the positive axis.
    #[inline]
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Front | Self::Above | Self::Right)
    }

    /// Offset to the neighboring cell this face looks at.
    #[inline]
    pub const fn offset(self) -> IVec3 {
        match self {
            Self::Front => IVec3::new(0, 0, 1),
            Self::Above => IVec3::new(0, 1, 0),
            Self::Right => IVec3::new(1, 0, 0),
            Self::Left => IVec3::new(-1, 0, 0),
            Self::Back => IVec3::new(0, 0, -1),
            Self::Below => IVec3::new(0, -1, 0),
        }
    }

    /// Outward unit normal.
    #[inline]
    pub fn normal(self) -> Vec3 {
        self.offset().as_vec3()
    }
}

/// A packed 32-bit voxel. See the module docs for the bit layout.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(from = "u32", into = "u32")]
pub struct VoxelCode(u32);

impl VoxelCode {
    /// Empty cell.
    pub const EMPTY: Self = Self(0);
    /// Occupancy bit. Keeps black voxels distinguishable from empty cells.
    pub const OCCUPIED_BIT: u32 = 0x40;
    /// All six face-state bits.
    pub const FACE_MASK: u32 = 0x3F;
    /// The 24 color bits.
    pub const COLOR_MASK: u32 = 0xFFFF_FF00;

    /// Create an occupied voxel of the given color.
    #[inline]
    pub const fn from_color(color: Color) -> Self {
        Self(
            ((color.r as u32) << 24)
                | ((color.g as u32) << 16)
                | ((color.b as u32) << 8)
                | Self::OCCUPIED_BIT,
        )
    }

    /// Interpret a raw code coming from an external buffer.
    ///
    /// Codes with color bits but no occupancy bit are treated as occupied, and
    /// stale face bits are dropped.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        let stripped = raw & !Self::FACE_MASK & !0x80;
        if stripped & Self::COLOR_MASK != 0 {
            Self(stripped | Self::OCCUPIED_BIT)
        } else {
            Self(stripped)
        }
    }

    /// The raw packed value, face bits included.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns true if this cell holds a voxel
    #[inline]
    pub const fn is_occupied(self) -> bool {
        self.0 & Self::OCCUPIED_BIT != 0
    }

    /// Returns true if this cell is empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        !self.is_occupied()
    }

    /// Color of the voxel. Meaningless for empty cells.
    #[inline]
    pub const fn color(self) -> Color {
        Color::new((self.0 >> 24) as u8, (self.0 >> 16) as u8, (self.0 >> 8) as u8)
    }

    /// Current face-state bits.
    #[inline]
    pub const fn face_flags(self) -> FaceFlags {
        FaceFlags::from_bits_truncate(self.0 & Self::FACE_MASK)
    }

    /// Returns true if the given face bit is set.
    #[inline]
    pub const fn has_face(self, direction: FaceDirection) -> bool {
        self.0 & direction.flag().bits() != 0
    }

    /// Set a face bit. Empty cells never carry face state.
    #[inline]
    #[must_use]
    pub const fn with_face(self, direction: FaceDirection) -> Self {
        if self.is_occupied() {
            Self(self.0 | direction.flag().bits())
        } else {
            self
        }
    }

    /// Clear a single face bit.
    #[inline]
    #[must_use]
    pub const fn without_face(self, direction: FaceDirection) -> Self {
        Self(self.0 & !direction.flag().bits())
    }

    /// Clear all face bits.
    #[inline]
    #[must_use]
    pub const fn without_faces(self) -> Self {
        Self(self.0 & !Self::FACE_MASK)
    }

    /// Color equality used for merging: both cells occupied and the 24 color
    /// bits identical. Two empty cells are never equal.
    #[inline]
    pub const fn color_eq(self, other: Self) -> bool {
        self.is_occupied() && other.is_occupied() && (self.0 ^ other.0) & Self::COLOR_MASK == 0
    }
}

impl From<Color> for VoxelCode {
    fn from(color: Color) -> Self {
        Self::from_color(color)
    }
}

impl From<u32> for VoxelCode {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<VoxelCode> for u32 {
    fn from(code: VoxelCode) -> Self {
        code.without_faces().raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_is_zero() {
        assert_eq!(VoxelCode::EMPTY.raw(), 0);
        assert!(VoxelCode::EMPTY.is_empty());
        assert!(VoxelCode::default().is_empty());
    }

    #[test]
    fn black_voxel_is_occupied() {
        let black = VoxelCode::from_color(Color::BLACK);
        assert!(black.is_occupied());
        assert_ne!(black, VoxelCode::EMPTY);
        assert_eq!(black.color(), Color::BLACK);
    }

    #[test]
    fn color_packing_layout() {
        let code = VoxelCode::from_color(Color::new(0x12, 0x34, 0x56));
        assert_eq!(code.raw(), 0x1234_5640);
        assert_eq!(code.color(), Color::new(0x12, 0x34, 0x56));
    }

    #[test]
    fn face_bits_do_not_affect_color_equality() {
        let a = VoxelCode::from_color(Color::new(10, 20, 30));
        let b = a.with_face(FaceDirection::Front).with_face(FaceDirection::Below);
        assert!(a.color_eq(b));
        assert_eq!(b.face_flags(), FaceFlags::FRONT | FaceFlags::BELOW);
        assert_eq!(b.without_faces(), a);
    }

    #[test]
    fn empty_cells_never_color_equal() {
        assert!(!VoxelCode::EMPTY.color_eq(VoxelCode::EMPTY));
        let black = VoxelCode::from_color(Color::BLACK);
        assert!(!black.color_eq(VoxelCode::EMPTY));
        assert!(black.color_eq(black));
    }

    #[test]
    fn empty_cells_never_carry_faces() {
        assert_eq!(VoxelCode::EMPTY.with_face(FaceDirection::Right), VoxelCode::EMPTY);
    }

    #[test]
    fn raw_import_normalizes_occupancy() {
        // Legacy code without the occupancy bit but with color and stale faces.
        let code = VoxelCode::from_raw(0xFF00_0003);
        assert!(code.is_occupied());
        assert_eq!(code.face_flags(), FaceFlags::empty());
        assert_eq!(code.color(), Color::new(255, 0, 0));

        assert!(VoxelCode::from_raw(0x0000_003F).is_empty());
        assert!(VoxelCode::from_raw(0x0000_0040).is_occupied());
    }

    #[test]
    fn direction_tables_agree() {
        for (i, dir) in FaceDirection::ALL.into_iter().enumerate() {
            assert_eq!(dir.index(), i);
            let offset = dir.offset();
            assert_eq!(offset.abs().element_sum(), 1);
            assert_eq!(offset[dir.axis()] > 0, dir.is_positive());
        }
        let bits = FaceDirection::ALL
            .iter()
            .fold(FaceFlags::empty(), |acc, dir| acc | dir.flag());
        assert_eq!(bits.bits(), VoxelCode::FACE_MASK);
    }
}
