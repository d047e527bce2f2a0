/// SubmeshElement - one submesh drawn with one material

use std::any::Any;
use std::sync::Arc;
use glam::{Mat4, Vec3};
use crate::camera::AABB;
use crate::graphics_device::{Buffer, IndexType, Pipeline, Rect2D};
use crate::material::MaterialInstance;
use super::{ElementKind, ElementType, RenderElement, RenderQueueRegistry,
    blended_sort_key, opaque_sort_key};

#[derive(Clone)]
pub struct IndexBufferBinding {
    pub buffer: Arc<dyn Buffer>,
    pub index_type: IndexType,
    pub index_count: u32,
    pub first_index: u32,
}

#[derive(Clone)]
pub struct SubmeshElement {
    pub render_layer: u8,
    pub pipeline: Arc<dyn Pipeline>,
    pub material: Arc<MaterialInstance>,
    pub world_matrix: Mat4,
    pub vertex_buffer: Arc<dyn Buffer>,
    pub vertex_count: u32,
    /// Non-indexed draw when `None`
    pub index_buffer: Option<IndexBufferBinding>,
    pub world_aabb: AABB,
    pub scissor: Option<Rect2D>,
}

impl RenderElement for SubmeshElement {
    fn element_type(&self) -> ElementType {
        Self::ELEMENT_TYPE
    }

    fn register(&self, registry: &mut RenderQueueRegistry) {
        registry.register_pipeline(&self.pipeline);
        registry.register_material(self.material.id());
        registry.register_vertex_buffer(&self.vertex_buffer);
    }

    fn sorting_score(&self, registry: &RenderQueueRegistry, eye: Vec3) -> u64 {
        if self.material.is_blending() {
            blended_sort_key(self.render_layer, self.world_aabb.center().distance(eye))
        } else {
            opaque_sort_key(
                self.render_layer,
                registry.pipeline_index(&self.pipeline),
                registry.material_index(self.material.id()),
                registry.vertex_buffer_index(&self.vertex_buffer),
            )
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ElementKind for SubmeshElement {
    const ELEMENT_TYPE: ElementType = ElementType::SUBMESH;
}
