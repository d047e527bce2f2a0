/// SubmeshRenderer - draws `SubmeshElement`s.
///
/// Per element it binds (only on change) the pipeline, the material group
/// at set 1 and the light group at set 2, pushes the world matrix, then
/// issues an indexed or non-indexed draw.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroup, BindingResource, CommandList, Rect2D, ShaderStage,
};
use crate::material::MaterialId;
use crate::render_element::SubmeshElement;
use crate::render_resources::RenderResources;
use crate::texture_sampler_cache::TextureSamplerCache;
use crate::utils::arc_address;
use super::element_renderer::{downcast_data, impl_element_renderer_data};
use super::material_bindings::MaterialBindings;
use super::{
    ElementRenderer, ElementRendererData, QueuedElement,
    LIGHT_SET, MATERIAL_SET, VIEW_PROJECTION_OFFSET, WORLD_MATRIX_OFFSET,
};

pub struct SubmeshRenderer {
    sampler_cache: Arc<Mutex<TextureSamplerCache>>,
}

#[derive(Default)]
pub struct SubmeshRendererData {
    materials: MaterialBindings,
    /// Keyed by (light buffer, pipeline)
    light_groups: FxHashMap<(usize, usize), Arc<dyn BindingGroup>>,
}

impl_element_renderer_data!(SubmeshRendererData);

impl SubmeshRendererData {
    pub fn material_group_count(&self) -> usize {
        self.materials.len()
    }

    pub fn light_group_count(&self) -> usize {
        self.light_groups.len()
    }
}

impl SubmeshRenderer {
    pub fn new(sampler_cache: Arc<Mutex<TextureSamplerCache>>) -> Self {
        Self { sampler_cache }
    }
}

impl ElementRenderer for SubmeshRenderer {
    fn instantiate_data(&self) -> Box<dyn ElementRendererData> {
        Box::new(SubmeshRendererData::default())
    }

    fn reset(&self, data: &mut dyn ElementRendererData, resources: &mut RenderResources) -> Result<()> {
        // Light buffers are rebuilt with the elements
        let data = downcast_data::<SubmeshRendererData>(data)?;
        for (_, group) in data.light_groups.drain() {
            resources.push_for_release(group);
        }
        Ok(())
    }

    fn prepare(
        &self,
        _camera: &Camera,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        elements: &[QueuedElement<'_>],
    ) -> Result<()> {
        let data = downcast_data::<SubmeshRendererData>(data)?;
        for queued in elements {
            let submesh = queued.downcast::<SubmeshElement>()?;
            data.materials.prepare(&self.sampler_cache, &submesh.pipeline, &submesh.material, resources)?;

            if let Some(light_buffer) = &queued.states.light_buffer {
                let key = (arc_address(light_buffer), arc_address(&submesh.pipeline));
                if !data.light_groups.contains_key(&key) {
                    let group = resources.device().create_binding_group(
                        &submesh.pipeline,
                        LIGHT_SET,
                        &[BindingResource::UniformBuffer(light_buffer.clone())],
                    )?;
                    data.light_groups.insert(key, group);
                }
            }
        }
        Ok(())
    }

    fn render(
        &self,
        camera: &Camera,
        data: &mut dyn ElementRendererData,
        command_list: &mut dyn CommandList,
        elements: &[QueuedElement<'_>],
    ) -> Result<()> {
        let data = downcast_data::<SubmeshRendererData>(data)?;
        let view_projection = camera.view_projection_matrix();
        let default_scissor = camera.effective_scissor();

        let mut bound_pipeline = None;
        let mut bound_material_group = None;
        let mut bound_light_group = None;
        let mut bound_vertex_buffer = None;
        let mut bound_index_buffer = None;
        let mut bound_scissor: Option<Rect2D> = None;

        for queued in elements {
            let submesh = queued.downcast::<SubmeshElement>()?;
            let pipeline = &submesh.pipeline;

            let pipeline_address = arc_address(pipeline);
            if bound_pipeline != Some(pipeline_address) {
                command_list.bind_pipeline(pipeline)?;
                command_list.push_constants(
                    &[ShaderStage::Vertex],
                    VIEW_PROJECTION_OFFSET,
                    bytemuck::bytes_of(&view_projection),
                )?;
                bound_pipeline = Some(pipeline_address);
                bound_material_group = None;
                bound_light_group = None;
            }

            let material_group = data.materials
                .get(submesh.material.id(), pipeline)
                .ok_or_else(|| not_prepared(submesh.material.id(), submesh.material.name()))?;
            if let Some(group) = material_group {
                let address = arc_address(group);
                if bound_material_group != Some(address) {
                    command_list.bind_binding_group(pipeline, MATERIAL_SET, group)?;
                    bound_material_group = Some(address);
                }
            }

            if let Some(light_buffer) = &queued.states.light_buffer {
                let group = data.light_groups
                    .get(&(arc_address(light_buffer), pipeline_address))
                    .ok_or_else(|| not_prepared(submesh.material.id(), submesh.material.name()))?;
                let address = arc_address(group);
                if bound_light_group != Some(address) {
                    command_list.bind_binding_group(pipeline, LIGHT_SET, group)?;
                    bound_light_group = Some(address);
                }
            }

            let scissor = submesh.scissor.unwrap_or(default_scissor);
            if bound_scissor != Some(scissor) {
                command_list.set_scissor(scissor)?;
                bound_scissor = Some(scissor);
            }

            command_list.push_constants(
                &[ShaderStage::Vertex],
                WORLD_MATRIX_OFFSET,
                bytemuck::bytes_of(&submesh.world_matrix),
            )?;

            let vertex_address = arc_address(&submesh.vertex_buffer);
            if bound_vertex_buffer != Some(vertex_address) {
                command_list.bind_vertex_buffer(&submesh.vertex_buffer, 0)?;
                bound_vertex_buffer = Some(vertex_address);
            }

            match &submesh.index_buffer {
                Some(indices) => {
                    let index_address = arc_address(&indices.buffer);
                    if bound_index_buffer != Some(index_address) {
                        command_list.bind_index_buffer(&indices.buffer, 0, indices.index_type)?;
                        bound_index_buffer = Some(index_address);
                    }
                    command_list.draw_indexed(indices.index_count, indices.first_index, 0)?;
                }
                None => command_list.draw(submesh.vertex_count, 0)?,
            }
        }
        Ok(())
    }

    fn evict_material(
        &self,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        material: MaterialId,
    ) {
        if let Ok(data) = downcast_data::<SubmeshRendererData>(data) {
            let evicted = data.materials.evict(material, resources);
            crate::engine_trace!("nova::SubmeshRenderer",
                "evicted {} binding groups of material {:?}", evicted, material);
        }
    }
}

fn not_prepared(material: MaterialId, name: &str) -> Error {
    Error::InvalidResource(format!(
        "submesh with material '{}' ({:?}) rendered without prepare", name, material
    ))
}

#[cfg(test)]
#[path = "submesh_renderer_tests.rs"]
mod tests;
