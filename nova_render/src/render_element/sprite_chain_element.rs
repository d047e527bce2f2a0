/// SpriteChainElement - a run of textured quads sharing one material

use std::any::Any;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use crate::camera::AABB;
use crate::graphics_device::{Pipeline, Rect2D};
use crate::material::MaterialInstance;
use super::{ElementKind, ElementType, RenderElement, RenderQueueRegistry,
    blended_sort_key, opaque_sort_key};

/// Sprite vertex as uploaded to the GPU (position, uv, color)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Clone)]
pub struct SpriteChainElement {
    pub render_layer: u8,
    pub pipeline: Arc<dyn Pipeline>,
    pub material: Arc<MaterialInstance>,
    pub world_matrix: Mat4,
    /// Four vertices per sprite, in local space
    pub vertices: Arc<[SpriteVertex]>,
    pub world_aabb: AABB,
    pub scissor: Option<Rect2D>,
}

impl SpriteChainElement {
    pub fn sprite_count(&self) -> u32 {
        (self.vertices.len() / 4) as u32
    }
}

impl RenderElement for SpriteChainElement {
    fn element_type(&self) -> ElementType {
        Self::ELEMENT_TYPE
    }

    fn register(&self, registry: &mut RenderQueueRegistry) {
        registry.register_pipeline(&self.pipeline);
        registry.register_material(self.material.id());
    }

    fn sorting_score(&self, registry: &RenderQueueRegistry, eye: Vec3) -> u64 {
        if self.material.is_blending() {
            blended_sort_key(self.render_layer, self.world_aabb.center().distance(eye))
        } else {
            // Vertices are uploaded per batch, so there is no buffer to group by
            opaque_sort_key(
                self.render_layer,
                registry.pipeline_index(&self.pipeline),
                registry.material_index(self.material.id()),
                0,
            )
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ElementKind for SpriteChainElement {
    const ELEMENT_TYPE: ElementType = ElementType::SPRITE_CHAIN;
}
