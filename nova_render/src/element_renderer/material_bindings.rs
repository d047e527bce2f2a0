/// Material binding group cache shared by the material-based renderers.
///
/// Groups are keyed by (material id, pipeline) and remember the material
/// binding version they were built from; a version bump rebuilds the group
/// and sends the stale one to the release queue.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{BindingGroup, Pipeline};
use crate::material::{MaterialId, MaterialInstance};
use crate::render_resources::RenderResources;
use crate::texture_sampler_cache::TextureSamplerCache;
use crate::utils::arc_address;
use super::MATERIAL_SET;

struct CachedGroup {
    binding_version: u64,
    /// `None` for materials without resources
    group: Option<Arc<dyn BindingGroup>>,
}

#[derive(Default)]
pub(crate) struct MaterialBindings {
    groups: FxHashMap<(MaterialId, usize), CachedGroup>,
}

impl MaterialBindings {
    /// Build the group of `material` for `pipeline` unless it is up to date
    pub fn prepare(
        &mut self,
        sampler_cache: &Mutex<TextureSamplerCache>,
        pipeline: &Arc<dyn Pipeline>,
        material: &MaterialInstance,
        resources: &mut RenderResources,
    ) -> Result<()> {
        let key = (material.id(), arc_address(pipeline));
        let binding_version = material.binding_version();
        if let Some(cached) = self.groups.get(&key) {
            if cached.binding_version == binding_version {
                return Ok(());
            }
        }

        let bindings = {
            let mut cache = sampler_cache.lock().map_err(|_| {
                crate::engine_err!("nova::MaterialBindings", "texture sampler cache lock poisoned")
            })?;
            material.binding_resources(&mut cache)?
        };
        let group = if bindings.is_empty() {
            None
        } else {
            Some(resources.device().create_binding_group(pipeline, MATERIAL_SET, &bindings)?)
        };

        if let Some(stale) = self.groups.insert(key, CachedGroup { binding_version, group }) {
            crate::engine_trace!("nova::MaterialBindings",
                "material '{}' rebuilt (binding version {} -> {})",
                material.name(), stale.binding_version, binding_version);
            resources.push_for_release(stale.group);
        }
        Ok(())
    }

    /// Prepared group: `None` if never prepared, `Some(None)` if the material binds nothing
    pub fn get(&self, material: MaterialId, pipeline: &Arc<dyn Pipeline>) -> Option<Option<&Arc<dyn BindingGroup>>> {
        self.groups
            .get(&(material, arc_address(pipeline)))
            .map(|cached| cached.group.as_ref())
    }

    /// Drop every group of `material`; returns how many were released
    pub fn evict(&mut self, material: MaterialId, resources: &mut RenderResources) -> usize {
        let mut evicted = 0;
        self.groups.retain(|&(id, _), cached| {
            if id != material {
                return true;
            }
            if let Some(group) = cached.group.take() {
                resources.push_for_release(group);
            }
            evicted += 1;
            false
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}
