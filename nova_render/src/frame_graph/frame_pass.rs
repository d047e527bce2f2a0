/// Frame pass builder, pass actions and the per-pass attachment view.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::Texture;
use crate::render_resources::RenderResources;
use super::AttachmentId;

/// Decision returned by an execution predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePassExecution {
    /// Record nothing for this pass this frame (layout barriers still run)
    Skip,
    Execute,
}

/// Action executed by a frame pass
///
/// Records draw commands between begin_render_pass() and end_render_pass().
/// The attachments view only exposes what the pass declared.
pub trait PassAction: Send {
    fn execute(&mut self, resources: &mut RenderResources, attachments: &PassAttachments) -> Result<()>;
}

/// Closure-based pass action
struct CallbackAction<F> {
    callback: F,
}

impl<F> PassAction for CallbackAction<F>
where
    F: FnMut(&mut RenderResources, &PassAttachments) -> Result<()> + Send,
{
    fn execute(&mut self, resources: &mut RenderResources, attachments: &PassAttachments) -> Result<()> {
        (self.callback)(resources, attachments)
    }
}

/// One declared pass. Obtained through `FrameGraph::add_pass`.
pub struct FramePass {
    pub(crate) name: String,
    pub(crate) inputs: Vec<AttachmentId>,
    pub(crate) outputs: Vec<AttachmentId>,
    pub(crate) depth_stencil_input: Option<AttachmentId>,
    pub(crate) depth_stencil_output: Option<AttachmentId>,
    pub(crate) clear_colors: Vec<(usize, [f32; 4])>,
    pub(crate) depth_stencil_clear: Option<(f32, u32)>,
    pub(crate) action: Option<Box<dyn PassAction>>,
    pub(crate) predicate: Option<Box<dyn Fn() -> FramePassExecution + Send>>,
}

impl FramePass {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            depth_stencil_input: None,
            depth_stencil_output: None,
            clear_colors: Vec::new(),
            depth_stencil_clear: None,
            action: None,
            predicate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample `attachment` in this pass
    pub fn add_input(&mut self, attachment: AttachmentId) -> &mut Self {
        self.inputs.push(attachment);
        self
    }

    /// Render into `attachment` as the next color output
    pub fn add_output(&mut self, attachment: AttachmentId) -> &mut Self {
        self.outputs.push(attachment);
        self
    }

    /// Depth test against `attachment` without writing it
    pub fn set_depth_stencil_input(&mut self, attachment: AttachmentId) -> &mut Self {
        self.depth_stencil_input = Some(attachment);
        self
    }

    /// Write depth/stencil into `attachment`
    pub fn set_depth_stencil_output(&mut self, attachment: AttachmentId) -> &mut Self {
        self.depth_stencil_output = Some(attachment);
        self
    }

    /// Clear the color output at `output_index` (declaration order) at pass start
    pub fn set_clear_color(&mut self, output_index: usize, color: [f32; 4]) -> &mut Self {
        self.clear_colors.retain(|(index, _)| *index != output_index);
        self.clear_colors.push((output_index, color));
        self
    }

    pub fn set_depth_stencil_clear(&mut self, depth: f32, stencil: u32) -> &mut Self {
        self.depth_stencil_clear = Some((depth, stencil));
        self
    }

    pub fn set_execution_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&mut RenderResources, &PassAttachments) -> Result<()> + Send + 'static,
    {
        self.action = Some(Box::new(CallbackAction { callback }));
        self
    }

    pub fn set_action(&mut self, action: Box<dyn PassAction>) -> &mut Self {
        self.action = Some(action);
        self
    }

    /// Evaluated every frame before the pass records anything
    pub fn set_execution_predicate<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn() -> FramePassExecution + Send + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub(crate) fn clear_color(&self, output_index: usize) -> Option<[f32; 4]> {
        self.clear_colors
            .iter()
            .find(|(index, _)| *index == output_index)
            .map(|(_, color)| *color)
    }

    /// Every attachment this pass reads
    pub(crate) fn reads(&self) -> impl Iterator<Item = AttachmentId> + '_ {
        self.inputs.iter().copied().chain(self.depth_stencil_input)
    }

    /// Every attachment this pass writes
    pub(crate) fn writes(&self) -> impl Iterator<Item = AttachmentId> + '_ {
        self.outputs.iter().copied().chain(self.depth_stencil_output)
    }
}

/// Textures a pass declared, resolved for the current frame
pub struct PassAttachments<'a> {
    pass_name: &'a str,
    textures: Vec<(AttachmentId, Arc<dyn Texture>)>,
    width: u32,
    height: u32,
}

impl<'a> PassAttachments<'a> {
    pub(crate) fn new(
        pass_name: &'a str,
        textures: Vec<(AttachmentId, Arc<dyn Texture>)>,
        width: u32,
        height: u32,
    ) -> Self {
        Self { pass_name, textures, width, height }
    }

    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Texture backing `attachment`; `None` if the pass never declared it
    pub fn get(&self, attachment: AttachmentId) -> Option<&Arc<dyn Texture>> {
        let texture = self.textures.iter().find(|(id, _)| *id == attachment).map(|(_, t)| t);
        debug_assert!(
            texture.is_some(),
            "pass '{}' accessed undeclared attachment #{}",
            self.pass_name,
            attachment.index()
        );
        texture
    }

    /// Frame size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
