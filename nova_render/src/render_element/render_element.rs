/// RenderElement trait, element type tags and pool handles

use std::any::Any;
use glam::Vec3;
use super::RenderQueueRegistry;

/// Element type tag, used to pick the pool and the renderer of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementType(pub u8);

impl ElementType {
    pub const SUBMESH: ElementType = ElementType(0);
    pub const SPRITE_CHAIN: ElementType = ElementType(1);
    pub const DEBUG_DRAW: ElementType = ElementType(2);
}

/// Copyable reference to a pooled element: `(type, slot index)`.
///
/// Only valid while the matching `RenderElementOwner` is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub element_type: ElementType,
    pub index: u32,
}

/// One drawable unit built by a frame pipeline pass.
///
/// Elements are plain descriptors: they reference GPU objects but never
/// record commands themselves. The element renderer registered for
/// `element_type()` does.
pub trait RenderElement: Any + Send + Sync {
    fn element_type(&self) -> ElementType;

    /// Register the pipelines, materials and buffers used by the sort key
    fn register(&self, registry: &mut RenderQueueRegistry);

    /// Sort key (lower draws first). `eye` is the camera position.
    fn sorting_score(&self, registry: &RenderQueueRegistry, eye: Vec3) -> u64;

    fn as_any(&self) -> &dyn Any;
}

/// Static type tag of a concrete element type
pub trait ElementKind: RenderElement + Sized {
    const ELEMENT_TYPE: ElementType;
}
