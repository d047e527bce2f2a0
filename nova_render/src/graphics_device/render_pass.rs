/// RenderPass and Framebuffer traits and their descriptors

use std::sync::Arc;
use crate::graphics_device::{Texture, TextureFormat, TextureLayout};

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Existing content is undefined
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Content may be discarded after the pass
    DontCare,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Stencil ops follow depth ops for combined formats
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: TextureLayout,
    pub final_layout: TextureLayout,
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_stencil_attachment: Option<AttachmentDesc>,
}

/// Render pass trait
pub trait RenderPass: Send + Sync {}

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    pub render_pass: Arc<dyn RenderPass>,
    pub color_attachments: Vec<Arc<dyn Texture>>,
    pub depth_stencil_attachment: Option<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
}

/// Framebuffer trait
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}
