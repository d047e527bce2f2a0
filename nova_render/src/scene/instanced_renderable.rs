/// InstancedRenderable - something a world instance can draw

use std::sync::Arc;
use glam::Mat4;
use crate::camera::AABB;
use crate::error::Result;
use crate::graphics_device::Rect2D;
use crate::material::MaterialInstance;
use crate::render_element::{RenderElementOwner, RenderElementPools};

/// Per-instance values copied into every element built for it
#[derive(Debug, Clone, Copy)]
pub struct ElementData {
    pub world_matrix: Mat4,
    pub world_aabb: AABB,
    pub scissor: Option<Rect2D>,
}

/// Shared drawable resource; one renderable can back many world instances.
pub trait InstancedRenderable: Send + Sync {
    /// Bounding box in local space
    fn aabb(&self) -> AABB;

    fn render_layer(&self) -> u8 {
        0
    }

    fn material_count(&self) -> usize;

    fn material(&self, index: usize) -> Option<Arc<MaterialInstance>>;

    /// Allocate the elements drawn by material pass `pass_index`.
    ///
    /// Materials without a pipeline for that pass contribute nothing.
    fn build_elements(
        &self,
        pass_index: usize,
        data: &ElementData,
        pools: &mut RenderElementPools,
        elements: &mut Vec<RenderElementOwner>,
    ) -> Result<()>;
}
