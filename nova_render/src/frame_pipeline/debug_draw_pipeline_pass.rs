/// DebugDrawPipelinePass - per-frame debug lines drawn into a viewer overlay.
///
/// Lines come from the frame pipeline's `DebugDrawer` and change every
/// frame, so the single debug element is rebuilt whenever lines exist.
/// The overlay is cleared to transparent and depth tested against the
/// viewer's depth attachment.

use std::sync::{Arc, Mutex};
use crate::context::{GraphicsContext, FORWARD_PASS};
use crate::error::Result;
use crate::frame_graph::FrameGraph;
use crate::render_element::DebugDrawElement;
use super::element_pass_state::{lock_state, ElementPassAction, ElementPassState};
use super::{FrameData, FramePipelinePass, PassInputOutputs};

pub struct DebugDrawPipelinePass {
    name: String,
    state: Arc<Mutex<ElementPassState>>,
}

impl DebugDrawPipelinePass {
    pub fn new(context: Arc<GraphicsContext>, name: impl Into<String>) -> Result<Self> {
        let material_pass = context.material_pass_index(FORWARD_PASS)?;
        Ok(Self {
            name: name.into(),
            state: Arc::new(Mutex::new(ElementPassState::new(context, material_pass))),
        })
    }

    pub fn element_count(&self) -> Result<usize> {
        Ok(lock_state(&self.state)?.element_count())
    }
}

impl FramePipelinePass for DebugDrawPipelinePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, frame: &mut FrameData<'_>) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.begin_frame(frame.resources, frame.camera);
        if frame.debug_lines.is_empty() && state.element_count() == 0 {
            return Ok(());
        }

        let pipeline = state.context().builtin_pipelines().debug_lines.clone();
        let lines = frame.debug_lines;
        state.invalidate();
        state.rebuild(frame.resources, lines.len() as u64, |builder| {
            if !lines.is_empty() {
                builder.add_element(DebugDrawElement { pipeline, vertices: lines.to_vec() })?;
            }
            Ok(())
        })
    }

    fn register_to_frame_graph(&mut self, graph: &mut FrameGraph, io: &PassInputOutputs) -> Result<()> {
        let Some(overlay) = io.overlay else {
            return Ok(());
        };
        graph
            .add_pass(self.name.clone())
            .add_output(overlay)
            .set_clear_color(0, [0.0, 0.0, 0.0, 0.0])
            .set_depth_stencil_input(io.depth)
            .set_action(Box::new(ElementPassAction::new(self.state.clone())));
        Ok(())
    }
}
