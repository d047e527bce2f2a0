/// RenderQueue - sort keys, deterministic radix sort, and same-type batching.
///
/// Sort key layout (`u64`, lower draws first):
///
/// ```text
/// 63..60  render layer (4 bits)
/// 59      blending flag
/// opaque:  47..32 pipeline index | 31..16 material index | 15..0 vertex buffer index
/// blended: 31..0  inverted view distance bits (far elements first)
/// ```
///
/// Ties are broken by insertion order, so a queue built from the same
/// elements always sorts the same way.

use std::sync::Arc;
use rdst::{RadixKey, RadixSort};
use rustc_hash::FxHashMap;
use crate::graphics_device::{Buffer, Pipeline};
use crate::material::MaterialId;
use crate::utils::arc_address;
use super::ElementHandle;

const LAYER_SHIFT: u32 = 60;
const BLEND_BIT: u64 = 1 << 59;

/// Key of an opaque element: grouped by pipeline, then material, then vertex buffer
pub fn opaque_sort_key(layer: u8, pipeline: u16, material: u16, vertex_buffer: u16) -> u64 {
    ((layer as u64 & 0xF) << LAYER_SHIFT)
        | ((pipeline as u64) << 32)
        | ((material as u64) << 16)
        | vertex_buffer as u64
}

/// Key of a blended element: after every opaque element of its layer, back to front
pub fn blended_sort_key(layer: u8, distance: f32) -> u64 {
    // Non-negative floats order like their bit patterns
    let distance_bits = distance.max(0.0).to_bits();
    ((layer as u64 & 0xF) << LAYER_SHIFT) | BLEND_BIT | (!distance_bits) as u64
}

// ===== REGISTRY =====

fn dense_index<K: std::hash::Hash + Eq>(map: &mut FxHashMap<K, u16>, key: K) -> u16 {
    let next = u16::try_from(map.len()).unwrap_or(u16::MAX);
    *map.entry(key).or_insert(next)
}

/// Dense `u16` indices for the objects referenced by queued elements.
///
/// Pipelines and vertex buffers are keyed by `Arc` identity, materials by id.
/// Indices are assigned in registration order and only feed sort keys.
#[derive(Debug, Default)]
pub struct RenderQueueRegistry {
    pipelines: FxHashMap<usize, u16>,
    materials: FxHashMap<MaterialId, u16>,
    vertex_buffers: FxHashMap<usize, u16>,
}

impl RenderQueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
        self.materials.clear();
        self.vertex_buffers.clear();
    }

    pub fn register_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> u16 {
        dense_index(&mut self.pipelines, arc_address(pipeline))
    }

    pub fn register_material(&mut self, material: MaterialId) -> u16 {
        dense_index(&mut self.materials, material)
    }

    pub fn register_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>) -> u16 {
        dense_index(&mut self.vertex_buffers, arc_address(buffer))
    }

    /// Unregistered objects sort last
    pub fn pipeline_index(&self, pipeline: &Arc<dyn Pipeline>) -> u16 {
        self.pipelines.get(&arc_address(pipeline)).copied().unwrap_or(u16::MAX)
    }

    pub fn material_index(&self, material: MaterialId) -> u16 {
        self.materials.get(&material).copied().unwrap_or(u16::MAX)
    }

    pub fn vertex_buffer_index(&self, buffer: &Arc<dyn Buffer>) -> u16 {
        self.vertex_buffers.get(&arc_address(buffer)).copied().unwrap_or(u16::MAX)
    }
}

// ===== QUEUE =====

#[derive(Debug, Clone, Copy)]
struct SortEntry {
    score: u64,
    order: u32,
    handle: ElementHandle,
}

impl RadixKey for SortEntry {
    // 4 bytes of insertion order below 8 bytes of score
    const LEVELS: usize = 12;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        if level < 4 {
            (self.order >> (level * 8)) as u8
        } else {
            (self.score >> ((level - 4) * 8)) as u8
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderQueue {
    entries: Vec<SortEntry>,
    sorted: Vec<ElementHandle>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sorted.clear();
    }

    pub fn insert(&mut self, handle: ElementHandle, score: u64) {
        let order = self.entries.len() as u32;
        self.entries.push(SortEntry { score, order, handle });
    }

    /// Sort by `(score, insertion order)`
    pub fn sort(&mut self) {
        self.entries.radix_sort_unstable();
        self.sorted.clear();
        self.sorted.extend(self.entries.iter().map(|entry| entry.handle));
    }

    /// Handles in sorted order (empty until `sort`)
    pub fn handles(&self) -> &[ElementHandle] {
        &self.sorted
    }

    /// Maximal runs of consecutive same-type handles, in sorted order
    pub fn batches(&self) -> impl Iterator<Item = &[ElementHandle]> {
        self.sorted.chunk_by(|a, b| a.element_type == b.element_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "render_queue_tests.rs"]
mod tests;
