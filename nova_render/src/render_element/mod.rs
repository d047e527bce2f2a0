/// Render element module - pooled draw descriptors and the sorted render queue
///
/// Frame pipeline passes turn visible instances into typed render elements
/// (submeshes, sprite chains, debug lines) stored in per-type pools. The
/// render queue orders them by sort key before element renderers record
/// draw commands.

mod render_element;
mod render_element_pool;
mod render_queue;
mod submesh_element;
mod sprite_chain_element;
mod debug_draw_element;

pub use render_element::{ElementHandle, ElementKind, ElementType, RenderElement};
pub use render_element_pool::{RenderElementOwner, RenderElementPool, RenderElementPools};
pub use render_queue::{RenderQueue, RenderQueueRegistry, blended_sort_key, opaque_sort_key};
pub use submesh_element::{IndexBufferBinding, SubmeshElement};
pub use sprite_chain_element::{SpriteChainElement, SpriteVertex};
pub use debug_draw_element::{DebugDrawElement, DebugLineVertex};
