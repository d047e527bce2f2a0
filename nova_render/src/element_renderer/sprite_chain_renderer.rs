/// SpriteChainRenderer - draws `SpriteChainElement`s in batches.
///
/// Consecutive sprite chains sharing pipeline, material and scissor are
/// merged into one vertex buffer (positions pre-transformed to world
/// space) and drawn with a single indexed draw. Every batch uses the
/// renderer's shared quad index buffer, which only ever grows.

use std::sync::{Arc, Mutex};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, CommandList, IndexType, Pipeline, Rect2D, ShaderStage,
};
use crate::material::{MaterialId, MaterialInstance};
use crate::render_element::{ElementHandle, SpriteChainElement, SpriteVertex};
use crate::render_resources::RenderResources;
use crate::texture_sampler_cache::TextureSamplerCache;
use crate::utils::arc_address;
use super::element_renderer::{downcast_data, impl_element_renderer_data};
use super::material_bindings::MaterialBindings;
use super::{
    ElementRenderer, ElementRendererData, QueuedElement,
    MATERIAL_SET, VIEW_PROJECTION_OFFSET, WORLD_MATRIX_OFFSET,
};

const INDICES_PER_QUAD: u32 = 6;
const MIN_QUAD_CAPACITY: u32 = 256;

struct SpriteBatch {
    pipeline: Arc<dyn Pipeline>,
    material: Arc<MaterialInstance>,
    scissor: Option<Rect2D>,
    /// `None` when every chain of the batch is empty
    vertex_buffer: Option<Arc<dyn Buffer>>,
    index_buffer: Arc<dyn Buffer>,
    quad_count: u32,
    element_count: usize,
}

#[derive(Default)]
pub struct SpriteChainRendererData {
    materials: MaterialBindings,
    batches: Vec<SpriteBatch>,
    /// First element of each prepared run -> its first batch
    batch_starts: FxHashMap<ElementHandle, usize>,
}

impl_element_renderer_data!(SpriteChainRendererData);

impl SpriteChainRendererData {
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

struct QuadIndexBuffer {
    buffer: Arc<dyn Buffer>,
    quad_capacity: u32,
}

pub struct SpriteChainRenderer {
    sampler_cache: Arc<Mutex<TextureSamplerCache>>,
    quad_indices: Mutex<Option<QuadIndexBuffer>>,
}

impl SpriteChainRenderer {
    pub fn new(sampler_cache: Arc<Mutex<TextureSamplerCache>>) -> Self {
        Self {
            sampler_cache,
            quad_indices: Mutex::new(None),
        }
    }

    /// Shared index buffer holding at least `quad_count` quads
    fn quad_index_buffer(&self, quad_count: u32, resources: &mut RenderResources) -> Result<Arc<dyn Buffer>> {
        let mut shared = self.quad_indices.lock().map_err(|_| {
            crate::engine_err!("nova::SpriteChainRenderer", "quad index buffer lock poisoned")
        })?;
        if let Some(existing) = shared.as_ref() {
            if existing.quad_capacity >= quad_count {
                return Ok(existing.buffer.clone());
            }
        }

        let quad_capacity = quad_count.max(MIN_QUAD_CAPACITY).next_power_of_two();
        let indices: Vec<u32> = (0..quad_capacity)
            .flat_map(|quad| {
                let first = quad * 4;
                [first, first + 1, first + 2, first + 2, first + 3, first]
            })
            .collect();
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let buffer = resources.device().create_buffer(&BufferDesc {
            size: bytes.len() as u64,
            usage: BufferUsage::Index,
        })?;
        buffer.update(0, bytes)?;
        crate::engine_debug!("nova::SpriteChainRenderer",
            "quad index buffer grown to {} quads", quad_capacity);

        if let Some(previous) = shared.replace(QuadIndexBuffer { buffer: buffer.clone(), quad_capacity }) {
            resources.push_for_release(previous.buffer);
        }
        Ok(buffer)
    }

    fn upload_vertices(chains: &[&SpriteChainElement], resources: &mut RenderResources) -> Result<Option<Arc<dyn Buffer>>> {
        let vertices: Vec<SpriteVertex> = chains
            .iter()
            .flat_map(|chain| {
                let world = chain.world_matrix;
                chain.vertices.iter().map(move |vertex| to_world(&world, vertex))
            })
            .collect();
        if vertices.is_empty() {
            return Ok(None);
        }

        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let buffer = resources.device().create_buffer(&BufferDesc {
            size: bytes.len() as u64,
            usage: BufferUsage::Vertex,
        })?;
        buffer.update(0, bytes)?;
        Ok(Some(buffer))
    }
}

fn to_world(world: &Mat4, vertex: &SpriteVertex) -> SpriteVertex {
    SpriteVertex {
        position: world.transform_point3(Vec3::from(vertex.position)).to_array(),
        ..*vertex
    }
}

fn same_batch(a: &SpriteChainElement, b: &SpriteChainElement) -> bool {
    Arc::ptr_eq(&a.material, &b.material)
        && arc_address(&a.pipeline) == arc_address(&b.pipeline)
        && a.scissor == b.scissor
}

impl ElementRenderer for SpriteChainRenderer {
    fn instantiate_data(&self) -> Box<dyn ElementRendererData> {
        Box::new(SpriteChainRendererData::default())
    }

    fn reset(&self, data: &mut dyn ElementRendererData, resources: &mut RenderResources) -> Result<()> {
        let data = downcast_data::<SpriteChainRendererData>(data)?;
        for batch in data.batches.drain(..) {
            if let Some(vertex_buffer) = batch.vertex_buffer {
                resources.push_for_release(vertex_buffer);
            }
        }
        data.batch_starts.clear();
        Ok(())
    }

    fn prepare(
        &self,
        _camera: &Camera,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        elements: &[QueuedElement<'_>],
    ) -> Result<()> {
        let data = downcast_data::<SpriteChainRendererData>(data)?;
        let chains = elements
            .iter()
            .map(|queued| queued.downcast::<SpriteChainElement>())
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = elements.first() else {
            return Ok(());
        };
        data.batch_starts.insert(first.handle, data.batches.len());

        for run in chains.chunk_by(|a, b| same_batch(a, b)) {
            let head = run[0];
            data.materials.prepare(&self.sampler_cache, &head.pipeline, &head.material, resources)?;

            let quad_count: u32 = run.iter().map(|chain| chain.sprite_count()).sum();
            let index_buffer = self.quad_index_buffer(quad_count, resources)?;
            let vertex_buffer = Self::upload_vertices(run, resources)?;

            data.batches.push(SpriteBatch {
                pipeline: head.pipeline.clone(),
                material: head.material.clone(),
                scissor: head.scissor,
                vertex_buffer,
                index_buffer,
                quad_count,
                element_count: run.len(),
            });
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
        let data = downcast_data::<SpriteChainRendererData>(data)?;
        let Some(first) = elements.first() else {
            return Ok(());
        };
        let start = *data.batch_starts.get(&first.handle).ok_or_else(|| {
            Error::InvalidResource(format!("sprite chain {:?} rendered without prepare", first.handle))
        })?;

        let view_projection = camera.view_projection_matrix();
        let default_scissor = camera.effective_scissor();
        let mut bound_pipeline = None;
        let mut bound_material_group = None;
        let mut bound_scissor: Option<Rect2D> = None;

        let mut covered = 0;
        for batch in &data.batches[start..] {
            if covered >= elements.len() {
                break;
            }
            covered += batch.element_count;

            let Some(vertex_buffer) = &batch.vertex_buffer else {
                continue;
            };

            let pipeline_address = arc_address(&batch.pipeline);
            if bound_pipeline != Some(pipeline_address) {
                command_list.bind_pipeline(&batch.pipeline)?;
                command_list.push_constants(
                    &[ShaderStage::Vertex],
                    VIEW_PROJECTION_OFFSET,
                    bytemuck::bytes_of(&view_projection),
                )?;
                // Vertices are already in world space
                command_list.push_constants(
                    &[ShaderStage::Vertex],
                    WORLD_MATRIX_OFFSET,
                    bytemuck::bytes_of(&Mat4::IDENTITY),
                )?;
                bound_pipeline = Some(pipeline_address);
                bound_material_group = None;
            }

            let group = data.materials
                .get(batch.material.id(), &batch.pipeline)
                .ok_or_else(|| Error::InvalidResource(format!(
                    "sprite material '{}' rendered without prepare", batch.material.name()
                )))?;
            if let Some(group) = group {
                let address = arc_address(group);
                if bound_material_group != Some(address) {
                    command_list.bind_binding_group(&batch.pipeline, MATERIAL_SET, group)?;
                    bound_material_group = Some(address);
                }
            }

            let scissor = batch.scissor.unwrap_or(default_scissor);
            if bound_scissor != Some(scissor) {
                command_list.set_scissor(scissor)?;
                bound_scissor = Some(scissor);
            }

            command_list.bind_vertex_buffer(vertex_buffer, 0)?;
            command_list.bind_index_buffer(&batch.index_buffer, 0, IndexType::U32)?;
            command_list.draw_indexed(batch.quad_count * INDICES_PER_QUAD, 0, 0)?;
        }
        Ok(())
    }

    fn evict_material(
        &self,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        material: MaterialId,
    ) {
        if let Ok(data) = downcast_data::<SpriteChainRendererData>(data) {
            data.materials.evict(material, resources);
        }
    }
}

#[cfg(test)]
#[path = "sprite_chain_renderer_tests.rs"]
mod tests;
