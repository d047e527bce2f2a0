/// FramePipeline - per-frame state machine driving viewers through the frame graph.
///
/// One `render` call walks
/// `Idle -> CollectVisible -> BuildElements -> CompileGraph -> ExecuteGraph -> Present -> Idle`:
///
/// 1. every viewer culls the world instances and lights against its frustum
///    and hashes the visible set
/// 2. every viewer pass prepares its render elements (rebuilt only when the
///    visibility hash changed)
/// 3. the frame graph is compiled, only when viewers or the swapchain
///    format changed since the last frame
/// 4. the backbuffer is bound to the acquired image, physical attachments
///    are (re)allocated if the frame size changed, and the graph executes
/// 5. the image is presented
///
/// A failed step drops the image unpresented; its release queue is flushed.

use std::any::Any;
use std::sync::{Arc, Mutex};
use glam::Mat4;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, Key, SlotMap};
use crate::camera::Camera;
use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::frame_graph::{
    AttachmentId, AttachmentSize, CompiledFrameGraph, FrameGraph, FramePassAttachment,
};
use crate::graphics_device::{
    Rect2D, SamplerFilter, SamplerWrap, TextureFormat, TextureSamplerInfo,
};
use crate::material::{MaterialId, MaterialInstance};
use crate::render_resources::{RenderImage, RenderResources};
use crate::scene::{DebugDrawer, ElementData, InstancedRenderable, Light};
use super::composition_pass::{CompositionAction, CompositionInput, CompositionState};
use super::element_pass_state::lock_state;
use super::frame_pipeline_pass::{combine_hash, HASH_SEED};
use super::{
    DebugDrawPipelinePass, DepthPipelinePass, ForwardPipelinePass, FrameData, FramePipelinePass,
    PassInputOutputs, Viewer, ViewerTarget, VisibleInstance, VisibleLight,
};

const LOG_SOURCE: &str = "nova::FramePipeline";

/// Name of the pass writing the swapchain image
pub const COMPOSITION_PASS: &str = "Composition";

new_key_type! {
    pub struct ViewerKey;
    pub struct WorldInstanceKey;
    pub struct LightKey;
}

/// Step of `FramePipeline::render` currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    CollectVisible,
    BuildElements,
    CompileGraph,
    ExecuteGraph,
    Present,
}

struct WorldInstance {
    world_matrix: Mat4,
    renderable: Arc<dyn InstancedRenderable>,
    scissor: Option<Rect2D>,
    version: u64,
}

struct LightEntry {
    light: Light,
    version: u64,
}

struct MaterialUse {
    material: Arc<MaterialInstance>,
    count: usize,
}

struct ViewerEntry {
    viewer: Viewer,
    passes: Vec<Box<dyn FramePipelinePass>>,
    visible: Vec<VisibleInstance>,
    lights: Vec<VisibleLight>,
    visibility_hash: u64,
}

pub struct FramePipeline {
    context: Arc<GraphicsContext>,
    viewers: SlotMap<ViewerKey, ViewerEntry>,
    instances: SlotMap<WorldInstanceKey, WorldInstance>,
    lights: SlotMap<LightKey, LightEntry>,
    materials: FxHashMap<MaterialId, MaterialUse>,
    /// Removed objects waiting for the next frame's release queue
    retired: Vec<Box<dyn Any + Send>>,
    debug_drawer: DebugDrawer,
    compiled: Option<CompiledFrameGraph>,
    backbuffer: Option<AttachmentId>,
    backbuffer_format: Option<TextureFormat>,
    composition: Arc<Mutex<CompositionState>>,
    /// Backbuffer viewers in composition order
    composition_order: Vec<ViewerKey>,
    graph_dirty: bool,
    stage: FrameStage,
    next_version: u64,
    next_viewer_id: u32,
}

impl FramePipeline {
    pub fn new(context: Arc<GraphicsContext>) -> Result<Self> {
        let sampler = context.sampler(
            &TextureSamplerInfo::with_filter(SamplerFilter::Nearest).with_wrap(SamplerWrap::Clamp),
        )?;
        let composition = CompositionState::new(context.builtin_pipelines().blit.clone(), sampler);

        Ok(Self {
            context,
            viewers: SlotMap::with_key(),
            instances: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            materials: FxHashMap::default(),
            retired: Vec::new(),
            debug_drawer: DebugDrawer::new(),
            compiled: None,
            backbuffer: None,
            backbuffer_format: None,
            composition: Arc::new(Mutex::new(composition)),
            composition_order: Vec::new(),
            graph_dirty: true,
            stage: FrameStage::Idle,
            next_version: 0,
            next_viewer_id: 0,
        })
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Lines drawn by the next frame only
    pub fn debug_drawer_mut(&mut self) -> &mut DebugDrawer {
        &mut self.debug_drawer
    }

    /// Graph compiled by the last frame, if any
    pub fn compiled_graph(&self) -> Option<&CompiledFrameGraph> {
        self.compiled.as_ref()
    }

    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    // ===== VIEWERS =====

    /// Add a viewer and create its passes; the frame graph is rebuilt next frame
    pub fn register_viewer(&mut self, viewer: Viewer) -> Result<ViewerKey> {
        let id = self.next_viewer_id;
        self.next_viewer_id += 1;

        let mut passes: Vec<Box<dyn FramePipelinePass>> = Vec::new();
        if self.context.config().depth_prepass {
            passes.push(Box::new(DepthPipelinePass::new(
                self.context.clone(), format!("Viewer #{} depth", id),
            )?));
        }
        passes.push(Box::new(ForwardPipelinePass::new(
            self.context.clone(), format!("Viewer #{} forward", id),
        )?));
        if viewer.target.is_backbuffer() {
            passes.push(Box::new(DebugDrawPipelinePass::new(
                self.context.clone(), format!("Viewer #{} debug draw", id),
            )?));
        }

        for entry in self.materials.values() {
            for pass in passes.iter_mut() {
                pass.register_material_instance(&entry.material);
            }
        }

        let key = self.viewers.insert(ViewerEntry {
            viewer,
            passes,
            visible: Vec::new(),
            lights: Vec::new(),
            visibility_hash: HASH_SEED,
        });
        self.graph_dirty = true;
        crate::engine_debug!(LOG_SOURCE, "registered viewer #{} ({} viewers)", id, self.viewers.len());
        Ok(key)
    }

    /// Remove a viewer; its passes are released once in-flight frames complete
    pub fn unregister_viewer(&mut self, key: ViewerKey) -> Result<Viewer> {
        let entry = self
            .viewers
            .remove(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown viewer {:?}", key)))?;
        self.retired.push(Box::new(entry.passes));
        self.graph_dirty = true;
        Ok(entry.viewer)
    }

    pub fn viewer(&self, key: ViewerKey) -> Option<&Viewer> {
        self.viewers.get(key).map(|entry| &entry.viewer)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    fn viewer_entry_mut(&mut self, key: ViewerKey) -> Result<&mut ViewerEntry> {
        self.viewers
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown viewer {:?}", key)))
    }

    /// Move a viewer's camera (no graph rebuild)
    pub fn set_viewer_camera(&mut self, key: ViewerKey, camera: Camera) -> Result<()> {
        self.viewer_entry_mut(key)?.viewer.camera = camera;
        Ok(())
    }

    pub fn set_viewer_clear_color(&mut self, key: ViewerKey, clear_color: [f32; 4]) -> Result<()> {
        self.viewer_entry_mut(key)?.viewer.clear_color = clear_color;
        self.graph_dirty = true;
        Ok(())
    }

    // ===== MATERIALS =====

    /// Count one more user of `material`; passes hear about its first use
    pub fn register_material_instance(&mut self, material: &Arc<MaterialInstance>) {
        let entry = self.materials.entry(material.id()).or_insert_with(|| MaterialUse {
            material: material.clone(),
            count: 0,
        });
        entry.count += 1;
        if entry.count == 1 {
            for viewer in self.viewers.values_mut() {
                for pass in viewer.passes.iter_mut() {
                    pass.register_material_instance(material);
                }
            }
        }
    }

    /// Count one less user of `material`; passes hear about its last use
    pub fn unregister_material_instance(&mut self, material: &MaterialInstance) {
        let id = material.id();
        let Some(entry) = self.materials.get_mut(&id) else {
            crate::engine_warn!(LOG_SOURCE, "material '{}' was not registered", material.name());
            return;
        };
        entry.count -= 1;
        if entry.count > 0 {
            return;
        }
        if let Some(entry) = self.materials.remove(&id) {
            self.retired.push(Box::new(entry.material));
        }
        for viewer in self.viewers.values_mut() {
            for pass in viewer.passes.iter_mut() {
                pass.unregister_material_instance(material);
            }
        }
    }

    /// Pipeline-level use count of `material`
    pub fn material_use_count(&self, material: MaterialId) -> usize {
        self.materials.get(&material).map_or(0, |entry| entry.count)
    }

    /// Rebuild every pass's elements next frame
    pub fn invalidate_elements(&mut self) {
        for viewer in self.viewers.values_mut() {
            for pass in viewer.passes.iter_mut() {
                pass.invalidate_elements();
            }
        }
    }

    // ===== WORLD INSTANCES =====

    pub fn register_world_instance(
        &mut self,
        world_matrix: Mat4,
        renderable: Arc<dyn InstancedRenderable>,
    ) -> WorldInstanceKey {
        for index in 0..renderable.material_count() {
            if let Some(material) = renderable.material(index) {
                self.register_material_instance(&material);
            }
        }
        let version = self.bump_version();
        self.instances.insert(WorldInstance {
            world_matrix,
            renderable,
            scissor: None,
            version,
        })
    }

    pub fn update_world_instance(&mut self, key: WorldInstanceKey, world_matrix: Mat4) -> Result<()> {
        let version = self.bump_version();
        let instance = self.instances.get_mut(key).ok_or_else(|| {
            Error::InvalidResource(format!("unknown world instance {:?}", key))
        })?;
        instance.world_matrix = world_matrix;
        instance.version = version;
        Ok(())
    }

    pub fn set_world_instance_scissor(&mut self, key: WorldInstanceKey, scissor: Option<Rect2D>) -> Result<()> {
        let version = self.bump_version();
        let instance = self.instances.get_mut(key).ok_or_else(|| {
            Error::InvalidResource(format!("unknown world instance {:?}", key))
        })?;
        instance.scissor = scissor;
        instance.version = version;
        Ok(())
    }

    /// Remove an instance; its renderable is released once in-flight frames complete
    pub fn unregister_world_instance(&mut self, key: WorldInstanceKey) -> Result<()> {
        let instance = self.instances.remove(key).ok_or_else(|| {
            Error::InvalidResource(format!("unknown world instance {:?}", key))
        })?;
        for index in 0..instance.renderable.material_count() {
            if let Some(material) = instance.renderable.material(index) {
                self.unregister_material_instance(&material);
            }
        }
        self.retired.push(Box::new(instance.renderable));
        Ok(())
    }

    pub fn world_instance_count(&self) -> usize {
        self.instances.len()
    }

    // ===== LIGHTS =====

    pub fn register_light(&mut self, light: Light) -> LightKey {
        let version = self.bump_version();
        self.lights.insert(LightEntry { light, version })
    }

    pub fn update_light(&mut self, key: LightKey, light: Light) -> Result<()> {
        let version = self.bump_version();
        let entry = self
            .lights
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("unknown light {:?}", key)))?;
        entry.light = light;
        entry.version = version;
        Ok(())
    }

    pub fn unregister_light(&mut self, key: LightKey) -> Result<Light> {
        self.lights
            .remove(key)
            .map(|entry| entry.light)
            .ok_or_else(|| Error::InvalidResource(format!("unknown light {:?}", key)))
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    // ===== FRAME =====

    /// Render every viewer into `image` and present it.
    ///
    /// # Errors
    ///
    /// Structural graph errors abort the frame before any pass executes.
    /// On error the image is dropped without being presented.
    pub fn render(&mut self, mut image: RenderImage<'_>) -> Result<()> {
        match self.record_frame(&mut image) {
            Ok(()) => {
                self.stage = FrameStage::Present;
                let result = image.present();
                self.finish_frame();
                result
            }
            Err(err) => {
                crate::engine_error!(LOG_SOURCE, "frame {} aborted during {:?}: {}",
                    image.frame_index(), self.stage, err);
                drop(image);
                self.finish_frame();
                Err(err)
            }
        }
    }

    fn finish_frame(&mut self) {
        self.debug_drawer.clear();
        self.stage = FrameStage::Idle;
    }

    fn record_frame(&mut self, image: &mut RenderImage<'_>) -> Result<()> {
        let backbuffer_texture = image.texture().clone();
        let (width, height) = image.size();
        let resources = image.resources();

        if !self.retired.is_empty() {
            resources.push_for_release(std::mem::take(&mut self.retired));
        }

        self.stage = FrameStage::CollectVisible;
        self.collect_visible();

        self.stage = FrameStage::BuildElements;
        let debug_lines = self.debug_drawer.vertices();
        for entry in self.viewers.values_mut() {
            let mut frame = FrameData {
                resources: &mut *resources,
                camera: &entry.viewer.camera,
                visible: &entry.visible,
                visibility_hash: entry.visibility_hash,
                lights: &entry.lights,
                debug_lines,
            };
            for pass in entry.passes.iter_mut() {
                pass.prepare(&mut frame)?;
            }
        }

        self.stage = FrameStage::CompileGraph;
        let format = backbuffer_texture.info().format;
        let rebuilt = self.compiled.is_none() || self.graph_dirty || self.backbuffer_format != Some(format);
        if rebuilt {
            self.build_frame_graph(resources, format)?;
        }

        let (compiled, backbuffer) = match (self.compiled.as_mut(), self.backbuffer) {
            (Some(compiled), Some(backbuffer)) => (compiled, backbuffer),
            _ => return Err(Error::InvalidResource("frame graph missing after compilation".to_string())),
        };
        compiled.bind_external_texture(backbuffer, backbuffer_texture)?;
        let reallocated = compiled.resize(resources, width, height)?;

        {
            let mut composition = lock_state(&self.composition)?;
            if reallocated && !rebuilt {
                composition.release_binding_groups(resources);
            }
            let viewers = &self.viewers;
            composition.update_scissors(
                self.composition_order
                    .iter()
                    .filter_map(|key| viewers.get(*key))
                    .map(|entry| entry.viewer.camera.effective_scissor()),
            );
        }

        self.stage = FrameStage::ExecuteGraph;
        compiled.execute(resources)
    }

    fn collect_visible(&mut self) {
        let Self { viewers, instances, lights, .. } = self;
        for entry in viewers.values_mut() {
            let frustum = *entry.viewer.camera.frustum();
            entry.visible.clear();
            entry.lights.clear();

            let mut hash = HASH_SEED;
            for (key, instance) in instances.iter() {
                let world_aabb = instance.renderable.aabb().transformed(&instance.world_matrix);
                if !frustum.intersects_aabb(&world_aabb) {
                    continue;
                }
                hash = combine_hash(combine_hash(hash, key.data().as_ffi()), instance.version);
                entry.visible.push(VisibleInstance {
                    key,
                    renderable: instance.renderable.clone(),
                    element_data: ElementData {
                        world_matrix: instance.world_matrix,
                        world_aabb,
                        scissor: instance.scissor,
                    },
                });
            }
            entry.visibility_hash = hash;

            for (key, light) in lights.iter() {
                if frustum.intersects_aabb(&light.light.bounding_aabb()) {
                    entry.lights.push(VisibleLight { key, light: light.light, version: light.version });
                }
            }
        }
    }

    /// Declare and compile the graph for the current viewers.
    ///
    /// The previous compiled graph goes through the release queue.
    fn build_frame_graph(&mut self, resources: &mut RenderResources, format: TextureFormat) -> Result<()> {
        let context = self.context.clone();
        let config = context.config();

        let mut graph = FrameGraph::new();
        graph.set_transient_memory_budget(config.transient_memory_budget);
        let backbuffer = graph.add_attachment(FramePassAttachment::external(
            "Backbuffer", format, AttachmentSize::FULL_FRAME,
        ));

        let mut order: Vec<ViewerKey> = self.viewers.keys().collect();
        order.sort_by_key(|key| self.viewers[*key].viewer.render_order);

        let mut inputs = Vec::new();
        let mut composition_order = Vec::new();
        for (index, key) in order.iter().enumerate() {
            let entry = &mut self.viewers[*key];

            let (color, size) = match &entry.viewer.target {
                ViewerTarget::Backbuffer => {
                    let color = graph.add_attachment(FramePassAttachment::transient(
                        format!("Viewer #{} color", index), config.color_format, AttachmentSize::FULL_FRAME,
                    ));
                    (color, AttachmentSize::FULL_FRAME)
                }
                ViewerTarget::Texture(texture) => {
                    let info = texture.info();
                    let size = AttachmentSize::Absolute { width: info.width, height: info.height };
                    let color = graph.add_attachment(FramePassAttachment::external(
                        format!("Viewer #{} target", index), info.format, size,
                    ));
                    graph.bind_external_texture(color, texture.clone())?;
                    (color, size)
                }
            };
            let depth = graph.add_attachment(FramePassAttachment::transient(
                format!("Viewer #{} depth", index), config.depth_stencil_format, size,
            ));
            let overlay = entry.viewer.target.is_backbuffer().then(|| {
                graph.add_attachment(FramePassAttachment::transient(
                    format!("Viewer #{} overlay", index), config.color_format, AttachmentSize::FULL_FRAME,
                ))
            });

            let io = PassInputOutputs {
                color,
                depth,
                overlay,
                clear_color: entry.viewer.clear_color,
                depth_prepass: config.depth_prepass,
            };
            for pass in entry.passes.iter_mut() {
                pass.register_to_frame_graph(&mut graph, &io)?;
            }

            if entry.viewer.target.is_backbuffer() {
                inputs.push(CompositionInput {
                    color,
                    overlay,
                    scissor: entry.viewer.camera.effective_scissor(),
                });
                composition_order.push(*key);
            }
        }

        let composition = graph.add_pass(COMPOSITION_PASS);
        for input in &inputs {
            composition.add_input(input.color);
            if let Some(overlay) = input.overlay {
                composition.add_input(overlay);
            }
        }
        composition
            .add_output(backbuffer)
            .set_clear_color(0, [0.0, 0.0, 0.0, 1.0])
            .set_action(Box::new(CompositionAction::new(self.composition.clone())));
        graph.set_backbuffer_output(backbuffer);

        let compiled = graph.compile()?;

        {
            let mut composition = lock_state(&self.composition)?;
            composition.release_binding_groups(resources);
            composition.set_inputs(inputs);
        }
        if let Some(previous) = self.compiled.replace(compiled) {
            resources.push_for_release(previous);
        }
        self.backbuffer = Some(backbuffer);
        self.backbuffer_format = Some(format);
        self.composition_order = composition_order;
        self.graph_dirty = false;

        crate::engine_debug!(LOG_SOURCE, "frame graph rebuilt for {} viewers", self.viewers.len());
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_pipeline_tests.rs"]
mod tests;
