/// Element renderer module - turns sorted render elements into draw commands
///
/// One renderer per element type is registered in the `GraphicsContext`.
/// Renderers are shared and stateless; everything a pass needs to keep
/// between frames (binding groups, upload buffers) lives in the
/// per-pass `ElementRendererData` created by `instantiate_data`.

mod element_renderer;
mod material_bindings;
mod submesh_renderer;
mod sprite_chain_renderer;
mod debug_draw_renderer;

pub use element_renderer::{
    ElementRenderer, ElementRendererData, ElementRendererRegistry, QueuedElement, RenderStates,
    LIGHT_SET, MATERIAL_SET, VIEW_PROJECTION_OFFSET, WORLD_MATRIX_OFFSET,
};
pub use submesh_renderer::{SubmeshRenderer, SubmeshRendererData};
pub use sprite_chain_renderer::{SpriteChainRenderer, SpriteChainRendererData};
pub use debug_draw_renderer::{DebugDrawRenderer, DebugDrawRendererData};
