/// Camera - view and projection of one viewer.
///
/// Unlike a passive container, the camera keeps its frustum in sync:
/// every setter that touches the view or projection re-extracts the
/// planes, so culling never sees a stale frustum.

use glam::{Mat4, Vec3};
use crate::graphics_device::{Viewport, Rect2D};
use super::frustum::Frustum;

#[derive(Debug, Clone)]
pub struct Camera {
    view_matrix: Mat4,
    projection_matrix: Mat4,
    frustum: Frustum,
    position: Vec3,
    viewport: Viewport,
    scissor: Option<Rect2D>,
}

impl Camera {
    /// Create a camera; the frustum and eye position are derived from `view`
    /// and `projection`. The scissor defaults to `None` (same as viewport).
    pub fn new(view: Mat4, projection: Mat4, viewport: Viewport) -> Self {
        let mut camera = Self {
            view_matrix: view,
            projection_matrix: projection,
            frustum: Frustum::from_view_projection(&(projection * view)),
            position: Vec3::ZERO,
            viewport,
            scissor: None,
        };
        camera.refresh();
        camera
    }

    fn refresh(&mut self) {
        self.frustum = Frustum::from_view_projection(&self.view_projection_matrix());
        self.position = self.view_matrix.inverse().col(3).truncate();
    }

    // ===== GETTERS =====

    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Eye position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Effective scissor: explicit scissor or viewport bounds as Rect2D.
    pub fn effective_scissor(&self) -> Rect2D {
        self.scissor.unwrap_or(Rect2D {
            x: self.viewport.x as i32,
            y: self.viewport.y as i32,
            width: self.viewport.width as u32,
            height: self.viewport.height as u32,
        })
    }

    // ===== SETTERS =====

    pub fn set_view(&mut self, matrix: Mat4) {
        self.view_matrix = matrix;
        self.refresh();
    }

    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection_matrix = matrix;
        self.refresh();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Set the scissor rectangle. `None` means same as viewport.
    pub fn set_scissor(&mut self, scissor: Option<Rect2D>) {
        self.scissor = scissor;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
