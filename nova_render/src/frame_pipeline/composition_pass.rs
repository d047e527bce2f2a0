/// Composition pass - blits every backbuffer viewer into the swapchain image.
///
/// Viewers are drawn in render order, color first then the debug overlay,
/// each as a full-screen triangle clipped to the viewer's scissor.

use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::frame_graph::{AttachmentId, PassAction, PassAttachments};
use crate::graphics_device::{BindingGroup, BindingResource, Pipeline, Rect2D, Sampler, Texture};
use crate::render_resources::RenderResources;
use crate::utils::arc_address;
use super::element_pass_state::lock_state;

/// One viewer as seen by the composition pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompositionInput {
    pub color: AttachmentId,
    pub overlay: Option<AttachmentId>,
    pub scissor: Rect2D,
}

pub(crate) struct CompositionState {
    pipeline: Arc<dyn Pipeline>,
    sampler: Arc<dyn Sampler>,
    inputs: Vec<CompositionInput>,
    /// Keyed by texture address; the texture is kept alive with its group
    binding_groups: FxHashMap<usize, (Arc<dyn Texture>, Arc<dyn BindingGroup>)>,
}

impl CompositionState {
    pub fn new(pipeline: Arc<dyn Pipeline>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            pipeline,
            sampler,
            inputs: Vec::new(),
            binding_groups: FxHashMap::default(),
        }
    }

    pub fn set_inputs(&mut self, inputs: Vec<CompositionInput>) {
        self.inputs = inputs;
    }

    /// Refresh the scissors, in input order
    pub fn update_scissors(&mut self, scissors: impl IntoIterator<Item = Rect2D>) {
        for (input, scissor) in self.inputs.iter_mut().zip(scissors) {
            input.scissor = scissor;
        }
    }

    /// Drop every cached blit binding group (attachments were reallocated)
    pub fn release_binding_groups(&mut self, resources: &mut RenderResources) {
        if !self.binding_groups.is_empty() {
            resources.push_for_release(std::mem::take(&mut self.binding_groups));
        }
    }

    pub fn binding_group_count(&self) -> usize {
        self.binding_groups.len()
    }
}

pub(crate) struct CompositionAction {
    state: Arc<Mutex<CompositionState>>,
}

impl CompositionAction {
    pub fn new(state: Arc<Mutex<CompositionState>>) -> Self {
        Self { state }
    }
}

impl PassAction for CompositionAction {
    fn execute(&mut self, resources: &mut RenderResources, attachments: &PassAttachments) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        let CompositionState { pipeline, sampler, inputs, binding_groups } = &mut *state;
        let device = resources.device().clone();

        let mut draws = Vec::with_capacity(inputs.len() * 2);
        for input in inputs.iter() {
            for attachment in std::iter::once(input.color).chain(input.overlay) {
                let texture = attachments.get(attachment).ok_or_else(|| {
                    Error::InvalidResource(format!(
                        "composition input #{} is not declared", attachment.index()
                    ))
                })?;
                let group = match binding_groups.entry(arc_address(texture)) {
                    Entry::Occupied(entry) => entry.get().1.clone(),
                    Entry::Vacant(entry) => {
                        let group = device.create_binding_group(
                            pipeline,
                            0,
                            &[BindingResource::SampledTexture(texture.clone(), sampler.clone())],
                        )?;
                        entry.insert((texture.clone(), group.clone()));
                        group
                    }
                };
                draws.push((input.scissor, group));
            }
        }

        if draws.is_empty() {
            return Ok(());
        }

        let command_list = resources.command_list()?;
        command_list.bind_pipeline(pipeline)?;
        for (scissor, group) in &draws {
            command_list.set_scissor(*scissor)?;
            command_list.bind_binding_group(pipeline, 0, group)?;
            command_list.draw(3, 0)?;
        }
        Ok(())
    }
}
