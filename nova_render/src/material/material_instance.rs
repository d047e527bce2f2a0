/// MaterialInstance - per-pass pipelines plus the resources bound at set 1.
///
/// Two monotonic versions let renderers and passes notice changes without
/// callbacks:
/// - `pipeline_version` bumps when a pass pipeline changes (elements must be rebuilt)
/// - `binding_version` bumps when a texture or the uniform buffer changes
///   (cached binding groups must be recreated)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::error::Result;
use crate::graphics_device::{Buffer, BindingResource, Pipeline, Texture, TextureSamplerInfo};
use crate::texture_sampler_cache::TextureSamplerCache;

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique material identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u64);

/// A texture and the sampler state it is read with
#[derive(Clone)]
pub struct MaterialTexture {
    pub texture: Arc<dyn Texture>,
    pub sampler_info: TextureSamplerInfo,
}

struct MaterialState {
    pipelines: Vec<Option<Arc<dyn Pipeline>>>,
    uniform_buffer: Option<Arc<dyn Buffer>>,
    textures: Vec<Option<MaterialTexture>>,
}

pub struct MaterialInstance {
    id: MaterialId,
    name: String,
    blending: bool,
    state: Mutex<MaterialState>,
    pipeline_version: AtomicU64,
    binding_version: AtomicU64,
}

// Material state is plain data: a panic while it was locked leaves nothing half-updated
fn lock(state: &Mutex<MaterialState>) -> MutexGuard<'_, MaterialState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MaterialInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            blending: false,
            state: Mutex::new(MaterialState {
                pipelines: Vec::new(),
                uniform_buffer: None,
                textures: Vec::new(),
            }),
            pipeline_version: AtomicU64::new(0),
            binding_version: AtomicU64::new(0),
        }
    }

    /// Alpha-blended materials are sorted back to front
    pub fn with_blending(mut self, blending: bool) -> Self {
        self.blending = blending;
        self
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_blending(&self) -> bool {
        self.blending
    }

    // ===== PIPELINES =====

    /// Set (or clear) the pipeline used for material pass `pass_index`
    pub fn set_pass_pipeline(&self, pass_index: usize, pipeline: Option<Arc<dyn Pipeline>>) {
        let mut state = lock(&self.state);
        if state.pipelines.len() <= pass_index {
            state.pipelines.resize(pass_index + 1, None);
        }
        state.pipelines[pass_index] = pipeline;
        self.pipeline_version.fetch_add(1, Ordering::Release);
    }

    pub fn pass_pipeline(&self, pass_index: usize) -> Option<Arc<dyn Pipeline>> {
        lock(&self.state).pipelines.get(pass_index).cloned().flatten()
    }

    pub fn has_pass(&self, pass_index: usize) -> bool {
        self.pass_pipeline(pass_index).is_some()
    }

    pub fn pipeline_version(&self) -> u64 {
        self.pipeline_version.load(Ordering::Acquire)
    }

    // ===== BINDINGS =====

    /// Bind `texture` at texture slot `slot` (binding `slot + 1` of set 1)
    pub fn set_texture(&self, slot: usize, texture: Arc<dyn Texture>, sampler_info: TextureSamplerInfo) {
        let mut state = lock(&self.state);
        if state.textures.len() <= slot {
            state.textures.resize(slot + 1, None);
        }
        state.textures[slot] = Some(MaterialTexture { texture, sampler_info });
        self.binding_version.fetch_add(1, Ordering::Release);
    }

    pub fn texture(&self, slot: usize) -> Option<MaterialTexture> {
        lock(&self.state).textures.get(slot).cloned().flatten()
    }

    /// Material parameters bound at binding 0 of set 1
    pub fn set_uniform_buffer(&self, buffer: Option<Arc<dyn Buffer>>) {
        lock(&self.state).uniform_buffer = buffer;
        self.binding_version.fetch_add(1, Ordering::Release);
    }

    pub fn binding_version(&self) -> u64 {
        self.binding_version.load(Ordering::Acquire)
    }

    /// Resources of set 1 in binding order: uniform buffer first, then
    /// every texture slot, with samplers taken from `sampler_cache`
    pub fn binding_resources(&self, sampler_cache: &mut TextureSamplerCache) -> Result<Vec<BindingResource>> {
        let state = lock(&self.state);
        let mut resources = Vec::with_capacity(state.textures.len() + 1);
        if let Some(buffer) = &state.uniform_buffer {
            resources.push(BindingResource::UniformBuffer(buffer.clone()));
        }
        for texture in state.textures.iter().flatten() {
            let sampler = sampler_cache.get(&texture.sampler_info)?;
            resources.push(BindingResource::SampledTexture(texture.texture.clone(), sampler));
        }
        Ok(resources)
    }
}

#[cfg(test)]
#[path = "material_instance_tests.rs"]
mod tests;
