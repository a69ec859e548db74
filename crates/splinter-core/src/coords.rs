//! Coordinate conventions shared by meshing, fracture and the cluster graph.
//!
//! Grid cell `(x, y, z)` occupies the unit cube from `(x-1, y-1, z-1)` to
//! `(x, y, z)` in mesh space. Everything that turns cells into positions goes
//! through [`cell_center`] and [`cell_containing`] so the offset stays in one
//! place.

use glam::{Affine3A, IVec3, Quat, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Aabb;

/// Center of a grid cell in mesh space.
#[inline]
pub fn cell_center(cell: UVec3) -> Vec3 {
    cell.as_vec3() - Vec3::splat(0.5)
}

/// Grid cell whose cube contains a mesh-space point.
///
/// Points beyond the `i32` range saturate to the extreme cell.
#[inline]
pub fn cell_containing(point: Vec3) -> IVec3 {
    (point.floor() + Vec3::ONE).as_ivec3()
}

/// Placement of a cluster's grid in the shared world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Placement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Placement {
    /// Placement at the world origin, unrotated, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a new placement
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Unrotated, unit-scale placement at a position.
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Local-to-world transform.
    #[inline]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Transform a mesh-space point into world space.
    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.to_affine().transform_point3(local)
    }

    /// Transform a world-space point into mesh space.
    #[inline]
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.to_affine().inverse().transform_point3(world)
    }

    /// Largest scale component, used to convert world radii to grid radii.
    #[inline]
    pub fn max_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }

    /// Placement of a sub-grid whose cell `(0, 0, 0)` sits at `origin` in this
    /// placement's grid.
    pub fn offset_by_cells(&self, origin: UVec3) -> Self {
        Self {
            position: self.transform_point(origin.as_vec3()),
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    /// World-space bounds of a grid of the given size under this placement.
    pub fn world_bounds(&self, size: UVec3) -> Aabb {
        let local = Aabb::new(Vec3::splat(-1.0), size.as_vec3() - Vec3::ONE);
        local.transformed(&self.to_affine())
    }
}
