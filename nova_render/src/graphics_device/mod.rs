/// Graphics device module - backend-facing traits and descriptors
///
/// The render core never talks to a GPU API directly. Backends implement
/// `GraphicsDevice`, `CommandList`, `Swapchain` and the resource traits;
/// everything above this module records work through them.

pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod sampler;
pub mod pipeline;
pub mod command_list;
pub mod render_pass;
pub mod swapchain;
pub mod binding_group;

pub use graphics_device::*;
pub use texture::*;
pub use buffer::*;
pub use sampler::*;
pub use pipeline::*;
pub use command_list::*;
pub use render_pass::*;
pub use swapchain::*;
pub use binding_group::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
