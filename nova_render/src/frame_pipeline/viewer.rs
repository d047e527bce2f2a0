/// Viewer - one camera rendered by the frame pipeline

use std::sync::Arc;
use crate::camera::Camera;
use crate::graphics_device::Texture;

/// Where a viewer's color output ends up
#[derive(Clone)]
pub enum ViewerTarget {
    /// Composited into the swapchain image
    Backbuffer,
    /// Rendered into a caller-owned texture (render-to-texture)
    Texture(Arc<dyn Texture>),
}

impl ViewerTarget {
    pub fn is_backbuffer(&self) -> bool {
        matches!(self, ViewerTarget::Backbuffer)
    }
}

#[derive(Clone)]
pub struct Viewer {
    pub camera: Camera,
    pub target: ViewerTarget,
    pub clear_color: [f32; 4],
    /// Composition order, lower first
    pub render_order: i32,
}

impl Viewer {
    /// Backbuffer viewer cleared to opaque black
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            target: ViewerTarget::Backbuffer,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            render_order: 0,
        }
    }

    pub fn with_target(mut self, target: ViewerTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }
}
