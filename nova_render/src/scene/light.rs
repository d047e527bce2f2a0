/// Light - directional, point and spot lights, and their GPU layout.
///
/// The light uniform buffer bound at set 2 is a 16-byte `LightHeader`
/// followed by one 64-byte `LightData` per light.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::camera::AABB;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Lights everything; direction points away from the light
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        radius: f32,
        color: Vec3,
        intensity: f32,
    },
    /// Angles are half-angles in radians
    Spot {
        position: Vec3,
        direction: Vec3,
        radius: f32,
        inner_angle: f32,
        outer_angle: f32,
        color: Vec3,
        intensity: f32,
    },
}

const LIGHT_DIRECTIONAL: f32 = 0.0;
const LIGHT_POINT: f32 = 1.0;
const LIGHT_SPOT: f32 = 2.0;

/// GPU layout of one light (64 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightData {
    /// xyz: position, w: radius
    pub position_radius: [f32; 4],
    /// xyz: direction, w: light type (0 directional, 1 point, 2 spot)
    pub direction_type: [f32; 4],
    /// rgb: color, a: intensity
    pub color_intensity: [f32; 4],
    /// x: cos(inner angle), y: cos(outer angle)
    pub spot_angles: [f32; 4],
}

/// Header of the light uniform buffer (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightHeader {
    pub light_count: u32,
    pub _padding: [u32; 3],
}

impl Light {
    pub fn intensity(&self) -> f32 {
        match *self {
            Light::Directional { intensity, .. }
            | Light::Point { intensity, .. }
            | Light::Spot { intensity, .. } => intensity,
        }
    }

    /// World-space box of everything the light can reach
    pub fn bounding_aabb(&self) -> AABB {
        match *self {
            Light::Directional { .. } => AABB::infinite(),
            Light::Point { position, radius, .. } | Light::Spot { position, radius, .. } => {
                AABB::from_center_half_extent(position, Vec3::splat(radius))
            }
        }
    }

    /// How much the light matters at `point` (higher is brighter)
    pub fn contribution_score(&self, point: Vec3) -> f32 {
        match *self {
            Light::Directional { .. } => f32::INFINITY,
            Light::Point { position, intensity, .. } | Light::Spot { position, intensity, .. } => {
                intensity / position.distance_squared(point).max(f32::EPSILON)
            }
        }
    }

    pub fn to_data(&self) -> LightData {
        match *self {
            Light::Directional { direction, color, intensity } => LightData {
                position_radius: [0.0; 4],
                direction_type: direction.normalize_or_zero().extend(LIGHT_DIRECTIONAL).to_array(),
                color_intensity: color.extend(intensity).to_array(),
                spot_angles: [0.0; 4],
            },
            Light::Point { position, radius, color, intensity } => LightData {
                position_radius: position.extend(radius).to_array(),
                direction_type: [0.0, 0.0, 0.0, LIGHT_POINT],
                color_intensity: color.extend(intensity).to_array(),
                spot_angles: [0.0; 4],
            },
            Light::Spot { position, direction, radius, inner_angle, outer_angle, color, intensity } => LightData {
                position_radius: position.extend(radius).to_array(),
                direction_type: direction.normalize_or_zero().extend(LIGHT_SPOT).to_array(),
                color_intensity: color.extend(intensity).to_array(),
                spot_angles: [inner_angle.cos(), outer_angle.cos(), 0.0, 0.0],
            },
        }
    }
}

/// Lights affecting `aabb`, brightest first, at most `max_lights`.
///
/// Ties keep the input order.
pub fn select_lights<'a, K: Copy>(
    lights: impl IntoIterator<Item = (K, &'a Light)>,
    aabb: &AABB,
    max_lights: usize,
) -> Vec<K> {
    let center = aabb.center();
    let mut candidates: Vec<(K, f32)> = lights
        .into_iter()
        .filter(|(_, light)| light.bounding_aabb().intersects(aabb))
        .map(|(key, light)| (key, light.contribution_score(center)))
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(max_lights);
    candidates.into_iter().map(|(key, _)| key).collect()
}

/// Bytes of the light uniform buffer for `lights`
pub fn pack_light_buffer<'a>(lights: impl IntoIterator<Item = &'a Light>) -> Vec<u8> {
    let data: Vec<LightData> = lights.into_iter().map(Light::to_data).collect();
    let header = LightHeader {
        light_count: data.len() as u32,
        _padding: [0; 3],
    };
    let mut bytes = Vec::with_capacity(
        std::mem::size_of::<LightHeader>() + data.len() * std::mem::size_of::<LightData>(),
    );
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&data));
    bytes
}

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
