/// TextureSamplerCache - one device sampler per distinct sampler state.
///
/// Sampler objects are cheap to bind but limited in number on some
/// devices, so identical `TextureSamplerInfo` values share a single
/// `Arc<dyn Sampler>`. Entries live as long as the cache (one per device
/// context); there is no eviction.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Sampler, TextureSamplerInfo};

pub struct TextureSamplerCache {
    device: Arc<dyn GraphicsDevice>,
    cache: FxHashMap<TextureSamplerInfo, Arc<dyn Sampler>>,
}

impl TextureSamplerCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            cache: FxHashMap::default(),
        }
    }

    /// Return the cached sampler for `info`, creating it on first request.
    ///
    /// Equal values always return the same object (`Arc::ptr_eq`).
    pub fn get(&mut self, info: &TextureSamplerInfo) -> Result<Arc<dyn Sampler>> {
        if let Some(sampler) = self.cache.get(info) {
            return Ok(Arc::clone(sampler));
        }

        let sampler = self.device.create_sampler(info)?;
        crate::engine_trace!("nova::TextureSamplerCache",
            "created sampler {:?} ({} cached)", info, self.cache.len() + 1);
        self.cache.insert(*info, Arc::clone(&sampler));
        Ok(sampler)
    }

    /// Number of distinct samplers created so far
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
#[path = "texture_sampler_cache_tests.rs"]
mod tests;
