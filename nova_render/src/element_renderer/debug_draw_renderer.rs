/// DebugDrawRenderer - draws `DebugDrawElement` line lists.
///
/// All lines of a prepared run go into one vertex buffer; each element then
/// draws its own vertex range with its (line topology) pipeline.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, CommandList, ShaderStage};
use crate::render_element::{DebugDrawElement, DebugLineVertex, ElementHandle};
use crate::render_resources::RenderResources;
use crate::utils::arc_address;
use super::element_renderer::{downcast_data, impl_element_renderer_data};
use super::{ElementRenderer, ElementRendererData, QueuedElement, VIEW_PROJECTION_OFFSET};

#[derive(Debug, Clone, Copy)]
struct LineRange {
    buffer: usize,
    first_vertex: u32,
    vertex_count: u32,
}

#[derive(Default)]
pub struct DebugDrawRendererData {
    vertex_buffers: Vec<Arc<dyn Buffer>>,
    ranges: FxHashMap<ElementHandle, LineRange>,
}

impl_element_renderer_data!(DebugDrawRendererData);

impl DebugDrawRendererData {
    pub fn vertex_buffer_count(&self) -> usize {
        self.vertex_buffers.len()
    }
}

#[derive(Default)]
pub struct DebugDrawRenderer;

impl DebugDrawRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ElementRenderer for DebugDrawRenderer {
    fn instantiate_data(&self) -> Box<dyn ElementRendererData> {
        Box::new(DebugDrawRendererData::default())
    }

    fn reset(&self, data: &mut dyn ElementRendererData, resources: &mut RenderResources) -> Result<()> {
        let data = downcast_data::<DebugDrawRendererData>(data)?;
        for buffer in data.vertex_buffers.drain(..) {
            resources.push_for_release(buffer);
        }
        data.ranges.clear();
        Ok(())
    }

    fn prepare(
        &self,
        _camera: &Camera,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        elements: &[QueuedElement<'_>],
    ) -> Result<()> {
        let data = downcast_data::<DebugDrawRendererData>(data)?;
        let buffer_index = data.vertex_buffers.len();
        let mut vertices: Vec<DebugLineVertex> = Vec::new();

        for queued in elements {
            let debug = queued.downcast::<DebugDrawElement>()?;
            data.ranges.insert(queued.handle, LineRange {
                buffer: buffer_index,
                first_vertex: vertices.len() as u32,
                vertex_count: debug.vertices.len() as u32,
            });
            vertices.extend_from_slice(&debug.vertices);
        }
        if vertices.is_empty() {
            return Ok(());
        }

        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let buffer = resources.device().create_buffer(&BufferDesc {
            size: bytes.len() as u64,
            usage: BufferUsage::Vertex,
        })?;
        buffer.update(0, bytes)?;
        data.vertex_buffers.push(buffer);

        crate::engine_trace!("nova::DebugDrawRenderer",
            "uploaded {} line vertices", vertices.len());
        Ok(())
    }

    fn render(
        &self,
        camera: &Camera,
        data: &mut dyn ElementRendererData,
        command_list: &mut dyn CommandList,
        elements: &[QueuedElement<'_>],
    ) -> Result<()> {
        let data = downcast_data::<DebugDrawRendererData>(data)?;
        let view_projection = camera.view_projection_matrix();
        let mut bound_pipeline = None;
        let mut bound_buffer = None;

        for queued in elements {
            let debug = queued.downcast::<DebugDrawElement>()?;
            let range = *data.ranges.get(&queued.handle).ok_or_else(|| {
                Error::InvalidResource(format!("debug lines {:?} rendered without prepare", queued.handle))
            })?;
            if range.vertex_count == 0 {
                continue;
            }

            let pipeline_address = arc_address(&debug.pipeline);
            if bound_pipeline != Some(pipeline_address) {
                command_list.bind_pipeline(&debug.pipeline)?;
                command_list.push_constants(
                    &[ShaderStage::Vertex],
                    VIEW_PROJECTION_OFFSET,
                    bytemuck::bytes_of(&view_projection),
                )?;
                bound_pipeline = Some(pipeline_address);
            }

            if bound_buffer != Some(range.buffer) {
                let buffer = data.vertex_buffers.get(range.buffer).ok_or_else(|| {
                    Error::InvalidResource(format!("debug vertex buffer #{} missing", range.buffer))
                })?;
                command_list.bind_vertex_buffer(buffer, 0)?;
                bound_buffer = Some(range.buffer);
            }
            command_list.draw(range.vertex_count, range.first_vertex)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "debug_draw_renderer_tests.rs"]
mod tests;
