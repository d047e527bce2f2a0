/// DepthPipelinePass - depth-only pre-pass of one viewer

use std::sync::{Arc, Mutex};
use crate::context::{GraphicsContext, DEPTH_PASS};
use crate::error::Result;
use crate::frame_graph::FrameGraph;
use crate::material::MaterialInstance;
use super::element_pass_state::{lock_state, ElementPassAction, ElementPassState};
use super::{FrameData, FramePipelinePass, PassInputOutputs};

pub struct DepthPipelinePass {
    name: String,
    state: Arc<Mutex<ElementPassState>>,
}

impl DepthPipelinePass {
    pub fn new(context: Arc<GraphicsContext>, name: impl Into<String>) -> Result<Self> {
        let material_pass = context.material_pass_index(DEPTH_PASS)?;
        Ok(Self {
            name: name.into(),
            state: Arc::new(Mutex::new(ElementPassState::new(context, material_pass))),
        })
    }

    /// Elements queued by the last rebuild
    pub fn element_count(&self) -> Result<usize> {
        Ok(lock_state(&self.state)?.element_count())
    }
}

impl FramePipelinePass for DepthPipelinePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, frame: &mut FrameData<'_>) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.begin_frame(frame.resources, frame.camera);
        if !state.needs_rebuild(frame.visibility_hash) {
            return Ok(());
        }

        let visible = frame.visible;
        state.rebuild(frame.resources, frame.visibility_hash, |builder| {
            for instance in visible {
                builder.add_instance(instance, None)?;
            }
            Ok(())
        })
    }

    fn register_to_frame_graph(&mut self, graph: &mut FrameGraph, io: &PassInputOutputs) -> Result<()> {
        graph
            .add_pass(self.name.clone())
            .set_depth_stencil_output(io.depth)
            .set_depth_stencil_clear(1.0, 0)
            .set_action(Box::new(ElementPassAction::new(self.state.clone())));
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
