/// Allocates and recycles unique `u32` slot indices.
///
/// Backs the render element pools: every live render element owns exactly
/// one slot, and freed slots are recycled (LIFO) before the allocator grows.
/// An optional capacity limit turns unbounded growth into an allocation
/// failure.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::with_capacity_limit(2);
/// let a = alloc.alloc();   // Some(0)
/// let b = alloc.alloc();   // Some(1)
/// assert!(alloc.alloc().is_none());
/// alloc.free(0);
/// let c = alloc.alloc();   // Some(0) (recycled)
/// ```
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    free_list: Vec<u32>,
    next_id: u32,
    len: u32,
    capacity_limit: Option<u32>,
}

impl SlotAllocator {
    /// Create a new empty allocator without a capacity limit
    pub fn new() -> Self {
        Self {
            free_list: Vec::new(),
            next_id: 0,
            len: 0,
            capacity_limit: None,
        }
    }

    /// Create a new empty allocator that never hands out more than `limit` distinct slots
    pub fn with_capacity_limit(limit: u32) -> Self {
        Self {
            capacity_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Allocate the next available slot index.
    ///
    /// Recycles the most recently freed slot first. Returns `None` when the
    /// free list is empty and growing would exceed the capacity limit.
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                if let Some(limit) = self.capacity_limit {
                    if self.next_id >= limit {
                        return None;
                    }
                }
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        self.len += 1;
        Some(id)
    }

    /// Return a slot index to the allocator for reuse
    pub fn free(&mut self, id: u32) {
        debug_assert!(id < self.next_id, "freeing an unallocated slot: {}", id);
        debug_assert!(!self.free_list.contains(&id), "slot {} freed twice", id);
        self.len -= 1;
        self.free_list.push(id);
    }

    /// Highest index ever allocated + 1.
    ///
    /// This is the minimum capacity the backing storage must have
    /// to accommodate all allocated indices.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Configured capacity limit, if any
    pub fn capacity_limit(&self) -> Option<u32> {
        self.capacity_limit
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
