/*!
# Nova Render

Frame graph and render pipeline scheduling core.

The crate is backend-agnostic: GPU work is recorded through the traits of
`graphics_device`, implemented by a backend outside this crate.

## Architecture

- **FrameGraph**: declarative passes and attachments, compiled into an
  execution order with transient attachment aliasing and layout transitions
- **FramePipeline**: per-frame state machine culling world instances per
  viewer, rebuilding render elements when visibility changes and
  executing the compiled graph into the swapchain image
- **RenderElementPool**: fixed-capacity typed pools of render elements
  with owner-based slot release
- **ElementRenderer**: per element type draw recording, dispatched from
  the sorted render queue
- **TextureSamplerCache**: deduplicated sampler objects
- **RenderResources / TransientResources**: per-frame recording context and
  deferred release of GPU objects until their submission completes
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod camera;
pub mod context;
pub mod element_renderer;
pub mod frame_graph;
pub mod frame_pipeline;
pub mod graphics_device;
pub mod material;
pub mod render_element;
pub mod render_resources;
pub mod scene;
pub mod texture_sampler_cache;
pub mod utils;

// Main nova namespace module
pub mod nova {
    // Error types
    pub use crate::error::{Error, FrameGraphError, Result};

    // Process-wide logger access
    pub use crate::engine::Engine;

    pub use crate::context::{BuiltinPipelines, GraphicsConfig, GraphicsContext};
    pub use crate::frame_graph::{CompiledFrameGraph, FrameGraph};
    pub use crate::frame_pipeline::FramePipeline;
    pub use crate::texture_sampler_cache::TextureSamplerCache;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }
}

// Re-export math library at crate root
pub use glam;
