//! Small allocation helpers shared by the render core

pub mod slot_allocator;

pub use slot_allocator::SlotAllocator;

use std::sync::Arc;

/// Identity of the object behind an `Arc` (vtable dropped for trait objects)
pub(crate) fn arc_address<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}
