/// FramePipelinePass trait and the per-frame data handed to passes

use std::sync::Arc;
use crate::camera::Camera;
use crate::error::Result;
use crate::frame_graph::{AttachmentId, FrameGraph};
use crate::material::MaterialInstance;
use crate::render_element::DebugLineVertex;
use crate::render_resources::RenderResources;
use crate::scene::{ElementData, InstancedRenderable, Light};
use super::frame_pipeline::{LightKey, WorldInstanceKey};

pub(crate) const HASH_SEED: u64 = 5;

/// Fold `value` into a visibility hash
pub(crate) fn combine_hash(hash: u64, value: u64) -> u64 {
    hash.wrapping_mul(23).wrapping_add(value)
}

/// World instance that survived frustum culling
#[derive(Clone)]
pub struct VisibleInstance {
    pub key: WorldInstanceKey,
    pub renderable: Arc<dyn InstancedRenderable>,
    pub element_data: ElementData,
}

/// Light whose bounds touch the viewer frustum
#[derive(Debug, Clone, Copy)]
pub struct VisibleLight {
    pub key: LightKey,
    pub light: Light,
    /// Bumped on every `update_light`
    pub version: u64,
}

/// Everything a pass sees while preparing one frame
pub struct FrameData<'a> {
    pub resources: &'a mut RenderResources,
    pub camera: &'a Camera,
    pub visible: &'a [VisibleInstance],
    /// Changes whenever the visible set or a visible transform changes
    pub visibility_hash: u64,
    pub lights: &'a [VisibleLight],
    pub debug_lines: &'a [DebugLineVertex],
}

/// Attachments of one viewer, declared by the frame pipeline
#[derive(Debug, Clone, Copy)]
pub struct PassInputOutputs {
    pub color: AttachmentId,
    pub depth: AttachmentId,
    /// Debug overlay, only for backbuffer viewers
    pub overlay: Option<AttachmentId>,
    pub clear_color: [f32; 4],
    /// A depth pre-pass fills `depth` before the forward pass
    pub depth_prepass: bool,
}

/// One step of a viewer's rendering.
///
/// `prepare` runs every frame before the graph is compiled or executed;
/// `register_to_frame_graph` runs only when the graph is rebuilt. Passes
/// share their state with the graph callbacks they register.
pub trait FramePipelinePass: Send {
    fn name(&self) -> &str;

    fn prepare(&mut self, frame: &mut FrameData<'_>) -> Result<()>;

    fn register_to_frame_graph(&mut self, graph: &mut FrameGraph, io: &PassInputOutputs) -> Result<()>;

    /// Force an element rebuild at the next `prepare`
    fn invalidate_elements(&mut self) {}

    fn register_material_instance(&mut self, _material: &Arc<MaterialInstance>) {}

    /// Cached bindings are evicted at the next `prepare` once unused
    fn unregister_material_instance(&mut self, _material: &MaterialInstance) {}
}
