/// BindingGroup trait and binding resources
///
/// A BindingGroup is an immutable set of GPU resource bindings (uniform
/// buffers, sampled textures). It is the abstraction over descriptor sets;
/// its layout is deduced from the pipeline it is created for.

use std::sync::Arc;
use crate::graphics_device::{Buffer, Texture, Sampler};

/// A single resource bound in a BindingGroup, in binding order
#[derive(Clone)]
pub enum BindingResource {
    /// Uniform buffer
    UniformBuffer(Arc<dyn Buffer>),
    /// Combined texture + sampler
    SampledTexture(Arc<dyn Texture>, Arc<dyn Sampler>),
}

/// Binding group trait (one descriptor set)
pub trait BindingGroup: Send + Sync {
    /// Set index this group was created for
    fn set_index(&self) -> u32;
}
