/// DebugDrawer - immediate-mode line list for one frame.
///
/// Lines accumulate until the debug-draw pass consumes them; the frame
/// pipeline clears the drawer once a frame is rendered.

use glam::Vec3;
use crate::camera::AABB;
use crate::render_element::DebugLineVertex;

#[derive(Debug, Default, Clone)]
pub struct DebugDrawer {
    vertices: Vec<DebugLineVertex>,
}

impl DebugDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color: [f32; 4]) {
        self.vertices.push(DebugLineVertex { position: from.to_array(), color });
        self.vertices.push(DebugLineVertex { position: to.to_array(), color });
    }

    /// The 12 edges of `aabb`
    pub fn draw_box(&mut self, aabb: &AABB, color: [f32; 4]) {
        let corner = |index: usize| {
            Vec3::new(
                if index & 1 == 0 { aabb.min.x } else { aabb.max.x },
                if index & 2 == 0 { aabb.min.y } else { aabb.max.y },
                if index & 4 == 0 { aabb.min.z } else { aabb.max.z },
            )
        };
        for index in 0..8 {
            for axis in [1, 2, 4] {
                // Each edge once: from the corner with the axis bit cleared
                if index & axis == 0 {
                    self.draw_line(corner(index), corner(index | axis), color);
                }
            }
        }
    }

    pub fn vertices(&self) -> &[DebugLineVertex] {
        &self.vertices
    }

    pub fn line_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}
