/// RenderElementPool - fixed-slot arena of render elements.
///
/// Elements are owned by the pool. `allocate` hands back a move-only
/// `RenderElementOwner`; dropping it pushes the slot onto a shared
/// "released" list which the pool drains before the next allocation.
/// Owners reach that list through a `Weak`, so a pool dropped first
/// simply takes its elements with it.
///
/// Frame pipeline passes push stale owners onto the frame's release
/// queue, which delays slot reuse until the GPU is done with the frame.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::utils::SlotAllocator;
use super::{ElementHandle, ElementKind, ElementType, RenderElement};

// ===== OWNER =====

/// Unique owner of one pooled element. Not `Clone`.
#[derive(Debug)]
pub struct RenderElementOwner {
    handle: ElementHandle,
    released: Weak<Mutex<Vec<u32>>>,
}

impl RenderElementOwner {
    pub fn handle(&self) -> ElementHandle {
        self.handle
    }
}

impl Drop for RenderElementOwner {
    fn drop(&mut self) {
        if let Some(released) = self.released.upgrade() {
            released
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(self.handle.index);
        }
    }
}

// ===== TYPED POOL =====

pub struct RenderElementPool<T: ElementKind> {
    allocator: SlotAllocator,
    elements: Vec<Option<T>>,
    released: Arc<Mutex<Vec<u32>>>,
}

impl<T: ElementKind> RenderElementPool<T> {
    /// Pool that never holds more than `capacity` live elements
    pub fn new(capacity: u32) -> Self {
        Self {
            allocator: SlotAllocator::with_capacity_limit(capacity),
            elements: Vec::new(),
            released: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Store `element` in a free slot (growing storage if needed)
    ///
    /// # Errors
    ///
    /// `PoolExhausted` when every slot up to the capacity limit is live.
    pub fn allocate(&mut self, element: T) -> Result<(RenderElementOwner, &mut T)> {
        self.reclaim();

        let index = match self.allocator.alloc() {
            Some(index) => index,
            None => {
                let capacity = self.allocator.capacity_limit().unwrap_or(u32::MAX);
                crate::engine_error!("nova::RenderElementPool",
                    "pool of element type {} exhausted ({} live elements)",
                    T::ELEMENT_TYPE.0, capacity);
                return Err(Error::PoolExhausted {
                    element_type: T::ELEMENT_TYPE.0,
                    capacity,
                });
            }
        };

        let slot = index as usize;
        if self.elements.len() <= slot {
            self.elements.resize_with(slot + 1, || None);
        }
        debug_assert!(self.elements[slot].is_none(), "slot {} handed out twice", index);

        let owner = RenderElementOwner {
            handle: ElementHandle { element_type: T::ELEMENT_TYPE, index },
            released: Arc::downgrade(&self.released),
        };
        Ok((owner, self.elements[slot].insert(element)))
    }

    /// Drop the elements of released owners and recycle their slots.
    ///
    /// Returns the number of reclaimed slots.
    pub fn reclaim(&mut self) -> usize {
        let released = std::mem::take(
            &mut *self.released.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for &index in &released {
            if let Some(slot) = self.elements.get_mut(index as usize) {
                *slot = None;
            }
            self.allocator.free(index);
        }
        released.len()
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.elements.get(index as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.elements.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Live elements, including released ones not yet reclaimed
    pub fn len(&self) -> u32 {
        self.allocator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocator.is_empty()
    }

    /// Number of distinct slots ever handed out
    pub fn high_water_mark(&self) -> u32 {
        self.allocator.high_water_mark()
    }
}

// ===== TYPE-ERASED REGISTRY =====

trait ErasedElementPool: Send {
    fn element(&self, index: u32) -> Option<&dyn RenderElement>;
    fn reclaim(&mut self) -> usize;
    fn len(&self) -> u32;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ElementKind> ErasedElementPool for RenderElementPool<T> {
    fn element(&self, index: u32) -> Option<&dyn RenderElement> {
        self.get(index).map(|element| element as &dyn RenderElement)
    }

    fn reclaim(&mut self) -> usize {
        RenderElementPool::reclaim(self)
    }

    fn len(&self) -> u32 {
        RenderElementPool::len(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One pool per element type, created on first allocation
pub struct RenderElementPools {
    pools: FxHashMap<ElementType, Box<dyn ErasedElementPool>>,
    capacity: u32,
}

impl RenderElementPools {
    /// `capacity` applies to each pool separately
    pub fn new(capacity: u32) -> Self {
        Self {
            pools: FxHashMap::default(),
            capacity,
        }
    }

    /// Typed pool for `T`, created on first use
    pub fn pool_mut<T: ElementKind>(&mut self) -> Result<&mut RenderElementPool<T>> {
        let capacity = self.capacity;
        let pool = self
            .pools
            .entry(T::ELEMENT_TYPE)
            .or_insert_with(|| Box::new(RenderElementPool::<T>::new(capacity)));
        pool.as_any_mut()
            .downcast_mut::<RenderElementPool<T>>()
            .ok_or_else(|| Error::InvalidResource(format!(
                "element type {} is already used by another element",
                T::ELEMENT_TYPE.0
            )))
    }

    pub fn allocate<T: ElementKind>(&mut self, element: T) -> Result<(RenderElementOwner, &mut T)> {
        self.pool_mut::<T>()?.allocate(element)
    }

    pub fn get(&self, handle: ElementHandle) -> Option<&dyn RenderElement> {
        self.pools.get(&handle.element_type)?.element(handle.index)
    }

    /// Reclaim released slots in every pool
    pub fn reclaim(&mut self) -> usize {
        self.pools.values_mut().map(|pool| pool.reclaim()).sum()
    }

    /// Live elements across every pool
    pub fn len(&self) -> u32 {
        self.pools.values().map(|pool| pool.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "render_element_pool_tests.rs"]
mod tests;
