/// Axis-Aligned Bounding Box
///
/// Renderables store their box in local space; the frame pipeline
/// transforms it by the world matrix at culling time.

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box centered on `center` with half extent `half`
    pub fn from_center_half_extent(center: Vec3, half: Vec3) -> Self {
        Self { min: center - half, max: center + half }
    }

    /// Box covering all of space (directional lights)
    pub fn infinite() -> Self {
        Self { min: Vec3::splat(f32::NEG_INFINITY), max: Vec3::splat(f32::INFINITY) }
    }

    pub fn is_infinite(&self) -> bool {
        !self.min.is_finite() || !self.max.is_finite()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Transform this local-space AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        if self.is_infinite() {
            return *self;
        }

        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    /// Test if this AABB fully contains another AABB.
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x
        && self.min.y <= other.min.y && self.max.y >= other.max.y
        && self.min.z <= other.min.z && self.max.z >= other.max.z
    }

    /// Test if this AABB intersects (overlaps or touches) another AABB.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Squared distance from `point` to the closest point of the box (0 inside)
    pub fn squared_distance(&self, point: Vec3) -> f32 {
        let closest = point.clamp(self.min, self.max);
        closest.distance_squared(point)
    }
}

#[cfg(test)]
#[path = "aabb_tests.rs"]
mod tests;
