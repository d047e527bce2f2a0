/// GraphicsDevice trait - resource factory and submission queue

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Texture, TextureDesc, Buffer, BufferDesc, Sampler, TextureSamplerInfo,
    RenderPass, RenderPassDesc, Framebuffer, FramebufferDesc,
    Pipeline, BindingGroup, BindingResource, CommandList,
};

/// Monotonic identifier of one queue submission.
///
/// Backends complete submissions in order: once `n` is complete, every
/// submission `<= n` is complete as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionIndex(pub u64);

/// Backend device: creates GPU objects and executes recorded command lists.
///
/// Implemented by backend crates (Vulkan, OpenGL, ...). All methods take
/// `&self`; backends use interior mutability for their own bookkeeping.
pub trait GraphicsDevice: Send + Sync {
    /// Create a texture
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a sampler object
    fn create_sampler(&self, info: &TextureSamplerInfo) -> Result<Arc<dyn Sampler>>;

    /// Create a render pass (attachment formats, load/store ops, layouts)
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer binding textures to a render pass
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Create an immutable binding group for `set_index` of `pipeline`
    fn create_binding_group(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Arc<dyn BindingGroup>>;

    /// Allocate a command list in the initial (not recording) state
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Submit a finished command list to the graphics queue
    fn submit(&self, command_list: &dyn CommandList) -> Result<SubmissionIndex>;

    /// Non-blocking fence check
    fn is_submission_complete(&self, submission: SubmissionIndex) -> bool;

    /// Block until `submission` has completed on the GPU
    fn wait_for_submission(&self, submission: SubmissionIndex) -> Result<()>;
}
