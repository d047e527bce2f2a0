/// ElementRenderer trait, per-pass renderer data and the renderer registry

use std::any::Any;
use std::sync::Arc;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, CommandList};
use crate::material::MaterialId;
use crate::render_element::{ElementHandle, ElementKind, ElementType, RenderElement, RenderQueue};
use crate::render_resources::RenderResources;

/// Binding group set of material resources
pub const MATERIAL_SET: u32 = 1;
/// Binding group set of the light uniform buffer
pub const LIGHT_SET: u32 = 2;
/// Push constant offset of the world matrix (64 bytes)
pub const WORLD_MATRIX_OFFSET: u32 = 0;
/// Push constant offset of the view-projection matrix (64 bytes)
pub const VIEW_PROJECTION_OFFSET: u32 = 64;

/// Per-element state computed by the pass that queued it
#[derive(Clone, Default)]
pub struct RenderStates {
    /// Uniform buffer with the lights affecting the element
    pub light_buffer: Option<Arc<dyn Buffer>>,
}

/// An element resolved from its pool, with its render states
#[derive(Clone, Copy)]
pub struct QueuedElement<'a> {
    pub handle: ElementHandle,
    pub element: &'a dyn RenderElement,
    pub states: &'a RenderStates,
}

impl<'a> QueuedElement<'a> {
    /// Concrete element, or `InvalidResource` if the handle was queued for the wrong renderer
    pub fn downcast<T: 'static>(&self) -> Result<&'a T> {
        self.element.as_any().downcast_ref::<T>().ok_or_else(|| {
            Error::InvalidResource(format!(
                "element {:?} is not a {}", self.handle, std::any::type_name::<T>()
            ))
        })
    }
}

/// Per-pass state of one element renderer
pub trait ElementRendererData: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implement `ElementRendererData` for a concrete data type
macro_rules! impl_element_renderer_data {
    ($data:ty) => {
        impl $crate::element_renderer::ElementRendererData for $data {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
}
pub(crate) use impl_element_renderer_data;

/// Concrete renderer data, or `InvalidResource` if it belongs to another renderer
pub(crate) fn downcast_data<T: 'static>(data: &mut dyn ElementRendererData) -> Result<&mut T> {
    data.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
        Error::InvalidResource(format!(
            "renderer data is not a {}", std::any::type_name::<T>()
        ))
    })
}

/// Records draw commands for one element type.
///
/// Call order for a pass that rebuilt its elements:
/// `reset`, then `prepare` for every same-type batch of the sorted queue,
/// then `prepare_end`. `render` runs inside the pass's render pass every
/// executed frame, with the same batches `prepare` saw.
pub trait ElementRenderer: Send + Sync {
    /// Fresh per-pass state
    fn instantiate_data(&self) -> Box<dyn ElementRendererData>;

    /// Drop per-build state; GPU objects go through the release queue
    fn reset(&self, _data: &mut dyn ElementRendererData, _resources: &mut RenderResources) -> Result<()> {
        Ok(())
    }

    /// Create the GPU objects a batch needs (binding groups, upload buffers)
    fn prepare(
        &self,
        camera: &Camera,
        data: &mut dyn ElementRendererData,
        resources: &mut RenderResources,
        elements: &[QueuedElement<'_>],
    ) -> Result<()>;

    fn prepare_end(&self, _data: &mut dyn ElementRendererData, _resources: &mut RenderResources) -> Result<()> {
        Ok(())
    }

    /// Record the draws of a prepared batch
    fn render(
        &self,
        camera: &Camera,
        data: &mut dyn ElementRendererData,
        command_list: &mut dyn CommandList,
        elements: &[QueuedElement<'_>],
    ) -> Result<()>;

    /// Forget every cached object built for `material`
    fn evict_material(
        &self,
        _data: &mut dyn ElementRendererData,
        _resources: &mut RenderResources,
        _material: MaterialId,
    ) {
    }
}

// ===== REGISTRY =====

/// One renderer per element type
#[derive(Default)]
pub struct ElementRendererRegistry {
    renderers: Vec<Option<Box<dyn ElementRenderer>>>,
}

impl ElementRendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the renderer of element type `E`
    pub fn register_element_renderer<E: ElementKind>(&mut self, renderer: Box<dyn ElementRenderer>) {
        let slot = E::ELEMENT_TYPE.0 as usize;
        if self.renderers.len() <= slot {
            self.renderers.resize_with(slot + 1, || None);
        }
        if self.renderers[slot].replace(renderer).is_some() {
            crate::engine_warn!("nova::ElementRendererRegistry",
                "renderer for element type {} replaced", slot);
        }
    }

    pub fn renderer(&self, element_type: ElementType) -> Option<&dyn ElementRenderer> {
        self.renderers
            .get(element_type.0 as usize)
            .and_then(Option::as_deref)
    }

    /// Visit every registered renderer in element type order
    pub fn for_each(&self, mut f: impl FnMut(ElementType, &dyn ElementRenderer)) {
        for (slot, renderer) in self.renderers.iter().enumerate() {
            if let Some(renderer) = renderer {
                f(ElementType(slot as u8), renderer.as_ref());
            }
        }
    }

    /// One data object per registered renderer, indexed by element type
    pub fn instantiate_data(&self) -> Vec<Option<Box<dyn ElementRendererData>>> {
        self.renderers
            .iter()
            .map(|renderer| renderer.as_ref().map(|renderer| renderer.instantiate_data()))
            .collect()
    }

    /// Dispatch every same-type run of the sorted `queue` to its renderer.
    ///
    /// Runs of a type without a registered renderer are skipped.
    pub fn process_render_queue<F>(&self, queue: &RenderQueue, mut f: F) -> Result<()>
    where
        F: FnMut(ElementType, &dyn ElementRenderer, &[ElementHandle]) -> Result<()>,
    {
        for batch in queue.batches() {
            let element_type = batch[0].element_type;
            match self.renderer(element_type) {
                Some(renderer) => f(element_type, renderer, batch)?,
                None => crate::engine_warn!("nova::ElementRendererRegistry",
                    "no renderer for element type {}; {} elements skipped",
                    element_type.0, batch.len()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "element_renderer_tests.rs"]
mod tests;
