/// ForwardPipelinePass - lit color pass of one viewer.
///
/// Each visible instance gets the brightest lights touching its world
/// bounds (at most `max_lights_per_draw`). Instances selecting the same
/// lights share one uniform buffer, bound at the light set.

use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use slotmap::Key;
use crate::context::{GraphicsContext, FORWARD_PASS};
use crate::element_renderer::RenderStates;
use crate::error::Result;
use crate::frame_graph::FrameGraph;
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage};
use crate::material::{MaterialId, MaterialInstance};
use crate::scene::{pack_light_buffer, select_lights};
use super::element_pass_state::{lock_state, ElementPassAction, ElementPassState};
use super::frame_pipeline_pass::combine_hash;
use super::{FrameData, FramePipelinePass, LightKey, PassInputOutputs};

pub struct ForwardPipelinePass {
    name: String,
    state: Arc<Mutex<ElementPassState>>,
    light_buffers: FxHashMap<Vec<LightKey>, Arc<dyn Buffer>>,
}

impl ForwardPipelinePass {
    pub fn new(context: Arc<GraphicsContext>, name: impl Into<String>) -> Result<Self> {
        let material_pass = context.material_pass_index(FORWARD_PASS)?;
        Ok(Self {
            name: name.into(),
            state: Arc::new(Mutex::new(ElementPassState::new(context, material_pass))),
            light_buffers: FxHashMap::default(),
        })
    }

    pub fn element_count(&self) -> Result<usize> {
        Ok(lock_state(&self.state)?.element_count())
    }

    /// Users of `material` as counted by this pass
    pub fn material_use_count(&self, material: MaterialId) -> Result<usize> {
        Ok(lock_state(&self.state)?.material_use_count(material))
    }

    /// Distinct light sets uploaded by the last rebuild
    pub fn light_buffer_count(&self) -> usize {
        self.light_buffers.len()
    }
}

impl FramePipelinePass for ForwardPipelinePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, frame: &mut FrameData<'_>) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.begin_frame(frame.resources, frame.camera);

        let hash = frame.lights.iter().fold(frame.visibility_hash, |hash, light| {
            combine_hash(combine_hash(hash, light.key.data().as_ffi()), light.version)
        });
        if !state.needs_rebuild(hash) {
            return Ok(());
        }

        let previous = std::mem::take(&mut self.light_buffers);
        if !previous.is_empty() {
            frame.resources.push_for_release(previous);
        }

        let max_lights = state.context().config().max_lights_per_draw;
        let device = frame.resources.device().clone();
        let visible = frame.visible;
        let lights = frame.lights;
        let light_buffers = &mut self.light_buffers;

        state.rebuild(frame.resources, hash, |builder| {
            for instance in visible {
                let selected = select_lights(
                    lights.iter().map(|visible| (visible.key, &visible.light)),
                    &instance.element_data.world_aabb,
                    max_lights,
                );
                if selected.is_empty() {
                    builder.add_instance(instance, None)?;
                    continue;
                }

                let buffer = match light_buffers.entry(selected) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        let bytes = pack_light_buffer(entry.key().iter().filter_map(|key| {
                            lights.iter().find(|visible| visible.key == *key).map(|visible| &visible.light)
                        }));
                        let buffer = device.create_buffer(&BufferDesc {
                            size: bytes.len() as u64,
                            usage: BufferUsage::Uniform,
                        })?;
                        buffer.update(0, &bytes)?;
                        entry.insert(buffer).clone()
                    }
                };
                let states = RenderStates { light_buffer: Some(buffer) };
                builder.add_instance(instance, Some(&states))?;
            }
            Ok(())
        })
    }

    fn register_to_frame_graph(&mut self, graph: &mut FrameGraph, io: &PassInputOutputs) -> Result<()> {
        let pass = graph.add_pass(self.name.clone());
        pass.add_output(io.color).set_clear_color(0, io.clear_color);
        if io.depth_prepass {
            pass.set_depth_stencil_input(io.depth);
        } else {
            pass.set_depth_stencil_output(io.depth).set_depth_stencil_clear(1.0, 0);
        }
        pass.set_action(Box::new(ElementPassAction::new(self.state.clone())));
        Ok(())
    }

    fn invalidate_elements(&mut self) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.invalidate();
        }
    }

    fn register_material_instance(&mut self, material: &Arc<MaterialInstance>) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.register_material(material);
        }
    }

    fn unregister_material_instance(&mut self, material: &MaterialInstance) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.unregister_material(material);
        }
    }
}

#[cfg(test)]
#[path = "forward_pipeline_pass_tests.rs"]
mod tests;
