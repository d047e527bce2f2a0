/// Model - a set of submeshes, each drawn with its own material

use std::sync::Arc;
use crate::camera::AABB;
use crate::error::Result;
use crate::graphics_device::Buffer;
use crate::material::MaterialInstance;
use crate::render_element::{IndexBufferBinding, RenderElementOwner, RenderElementPools, SubmeshElement};
use super::{ElementData, InstancedRenderable};

#[derive(Clone)]
pub struct Submesh {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub vertex_count: u32,
    pub index_buffer: Option<IndexBufferBinding>,
    pub material: Arc<MaterialInstance>,
}

pub struct Model {
    submeshes: Vec<Submesh>,
    aabb: AABB,
    render_layer: u8,
}

impl Model {
    pub fn new(submeshes: Vec<Submesh>, aabb: AABB) -> Self {
        Self { submeshes, aabb, render_layer: 0 }
    }

    pub fn with_render_layer(mut self, render_layer: u8) -> Self {
        self.render_layer = render_layer;
        self
    }

    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }
}

impl InstancedRenderable for Model {
    fn aabb(&self) -> AABB {
        self.aabb
    }

    fn render_layer(&self) -> u8 {
        self.render_layer
    }

    fn material_count(&self) -> usize {
        self.submeshes.len()
    }

    fn material(&self, index: usize) -> Option<Arc<MaterialInstance>> {
        self.submeshes.get(index).map(|submesh| submesh.material.clone())
    }

    fn build_elements(
        &self,
        pass_index: usize,
        data: &ElementData,
        pools: &mut RenderElementPools,
        elements: &mut Vec<RenderElementOwner>,
    ) -> Result<()> {
        for submesh in &self.submeshes {
            let Some(pipeline) = submesh.material.pass_pipeline(pass_index) else {
                continue;
            };
            let (owner, _) = pools.allocate(SubmeshElement {
                render_layer: self.render_layer,
                pipeline,
                material: submesh.material.clone(),
                world_matrix: data.world_matrix,
                vertex_buffer: submesh.vertex_buffer.clone(),
                vertex_count: submesh.vertex_count,
                index_buffer: submesh.index_buffer.clone(),
                world_aabb: data.world_aabb,
                scissor: data.scissor,
            })?;
            elements.push(owner);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
