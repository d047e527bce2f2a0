/// DebugDrawElement - a batch of colored lines in world space

use std::any::Any;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::graphics_device::Pipeline;
use super::{ElementKind, ElementType, RenderElement, RenderQueueRegistry};

/// Line vertex as uploaded to the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugLineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

#[derive(Clone)]
pub struct DebugDrawElement {
    pub pipeline: Arc<dyn Pipeline>,
    /// Two vertices per line
    pub vertices: Vec<DebugLineVertex>,
}

impl RenderElement for DebugDrawElement {
    fn element_type(&self) -> ElementType {
        Self::ELEMENT_TYPE
    }

    fn register(&self, registry: &mut RenderQueueRegistry) {
        registry.register_pipeline(&self.pipeline);
    }

    fn sorting_score(&self, _registry: &RenderQueueRegistry, _eye: Vec3) -> u64 {
        // Overlay: always last
        u64::MAX
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ElementKind for DebugDrawElement {
    const ELEMENT_TYPE: ElementType = ElementType::DEBUG_DRAW;
}
