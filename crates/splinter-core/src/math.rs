//! Math utilities and helpers.

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-Aligned Bounding Box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any point expands.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new AABB from min and max corners
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut aabb = Self::EMPTY;
        let mut any = false;
        for point in points {
            aabb.expand_to_include(point);
            any = true;
        }
        any.then_some(aabb)
    }

    /// Returns true if no point was ever added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Get the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the AABB
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the half-extents of the AABB
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Check if a sphere overlaps the AABB.
    #[inline]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Returns true if, on some axis, the centers are farther apart than the
    /// combined half-extents plus `margin`.
    #[inline]
    pub fn separated_from(&self, other: &Self, margin: f32) -> bool {
        let distance = (self.center() - other.center()).abs();
        let reach = self.half_extents() + other.half_extents() + Vec3::splat(margin);
        distance.cmpgt(reach).any()
    }

    /// Expand AABB to include a point
    #[inline]
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Bounds of this box after an affine transform (all 8 corners).
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        let mut out = Self::EMPTY;
        for i in 0..8u32 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_to_include(transform.transform_point3(corner));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn from_points_empty_is_none() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
        assert!(Aabb::EMPTY.is_empty());
        let aabb = Aabb::from_points([Vec3::ZERO, Vec3::new(2.0, -1.0, 3.0)]).unwrap();
        assert_eq!(aabb.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(2.0, 0.0, 3.0));
    }

    #[test]
    fn separation_uses_margin() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let one_gap = Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 1.0));
        let far = Aabb::new(Vec3::new(2.5, 0.0, 0.0), Vec3::new(3.5, 1.0, 1.0));

        assert!(!a.separated_from(&touching, 1.0));
        assert!(!a.separated_from(&one_gap, 1.0));
        assert!(a.separated_from(&far, 1.0));
        assert!(a.separated_from(&one_gap, 0.0));
    }

    #[test]
    fn sphere_overlap() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.intersects_sphere(Vec3::new(1.5, 0.5, 0.5), 0.5));
        assert!(!aabb.intersects_sphere(Vec3::new(1.6, 0.5, 0.5), 0.5));
        assert!(aabb.intersects_sphere(Vec3::splat(0.5), 0.01));
    }

    #[test]
    fn transformed_rotation_grows_box() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::ONE);
        let rotated = aabb.transformed(&Affine3A::from_quat(Quat::from_rotation_y(
            std::f32::consts::FRAC_PI_4,
        )));
        assert!(rotated.max.x > 1.4);
        assert!((rotated.max.y - 1.0).abs() < 1e-5);
    }
}
