use super::*;
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockPipeline};
use crate::render_element::ElementType;

fn handle(element_type: ElementType, index: u32) -> ElementHandle {
    ElementHandle { element_type, index }
}

// ============================================================================
// Sort keys
// ============================================================================

#[test]
fn test_layer_dominates_every_other_field() {
    let low_layer = opaque_sort_key(0, u16::MAX, u16::MAX, u16::MAX);
    let high_layer = opaque_sort_key(1, 0, 0, 0);
    assert!(low_layer < high_layer);
    assert!(blended_sort_key(0, 0.0) < high_layer);
}

#[test]
fn test_blended_after_opaque_in_same_layer() {
    let opaque = opaque_sort_key(2, u16::MAX, u16::MAX, u16::MAX);
    let blended = blended_sort_key(2, 1.0e6);
    assert!(opaque < blended);
}

#[test]
fn test_blended_far_elements_first() {
    let near = blended_sort_key(0, 1.0);
    let far = blended_sort_key(0, 50.0);
    assert!(far < near);
}

#[test]
fn test_opaque_groups_by_pipeline_then_material() {
    let a = opaque_sort_key(0, 0, 5, 9);
    let b = opaque_sort_key(0, 1, 0, 0);
    let c = opaque_sort_key(0, 0, 6, 0);
    assert!(a < c);
    assert!(c < b);
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_indices_follow_identity() {
    let mut registry = RenderQueueRegistry::new();
    let forward = MockPipeline::shared("forward");
    let same_name = MockPipeline::shared("forward");
    let buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));

    assert_eq!(registry.register_pipeline(&forward), 0);
    assert_eq!(registry.register_pipeline(&same_name), 1);
    assert_eq!(registry.register_pipeline(&forward.clone()), 0);
    assert_eq!(registry.register_material(MaterialId(10)), 0);
    assert_eq!(registry.register_vertex_buffer(&buffer), 0);

    assert_eq!(registry.pipeline_index(&same_name), 1);
    assert_eq!(registry.material_index(MaterialId(99)), u16::MAX);

    registry.clear();
    assert_eq!(registry.pipeline_index(&forward), u16::MAX);
}

// ============================================================================
// Queue
// ============================================================================

#[test]
fn test_sort_orders_by_score() {
    let mut queue = RenderQueue::new();
    queue.insert(handle(ElementType::SUBMESH, 0), 30);
    queue.insert(handle(ElementType::SUBMESH, 1), 10);
    queue.insert(handle(ElementType::SUBMESH, 2), 20);
    queue.sort();

    let order: Vec<u32> = queue.handles().iter().map(|h| h.index).collect();
    assert_eq!(order, vec![1, 2, 0]);
}

#[test]
fn test_equal_scores_keep_insertion_order() {
    let mut queue = RenderQueue::new();
    for index in [7, 3, 9, 1, 4] {
        queue.insert(handle(ElementType::SUBMESH, index), 42);
    }
    queue.sort();

    let order: Vec<u32> = queue.handles().iter().map(|h| h.index).collect();
    assert_eq!(order, vec![7, 3, 9, 1, 4]);
}

#[test]
fn test_sort_matches_reference_ordering() {
    let mut queue = RenderQueue::new();
    let mut expected = Vec::new();
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    for index in 0..2000u32 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        // Few distinct scores so ties are frequent
        let score = (state % 16) << 56 | (state % 5);
        queue.insert(handle(ElementType::SUBMESH, index), score);
        expected.push((score, index));
    }
    queue.sort();
    expected.sort();

    let sorted: Vec<u32> = queue.handles().iter().map(|h| h.index).collect();
    let reference: Vec<u32> = expected.iter().map(|&(_, index)| index).collect();
    assert_eq!(sorted, reference);
}

#[test]
fn test_batches_group_consecutive_types() {
    let mut queue = RenderQueue::new();
    queue.insert(handle(ElementType::SUBMESH, 0), 1);
    queue.insert(handle(ElementType::SUBMESH, 1), 2);
    queue.insert(handle(ElementType::SPRITE_CHAIN, 0), 3);
    queue.insert(handle(ElementType::SUBMESH, 2), 4);
    queue.sort();

    let batches: Vec<(ElementType, usize)> = queue
        .batches()
        .map(|batch| (batch[0].element_type, batch.len()))
        .collect();
    assert_eq!(batches, vec![
        (ElementType::SUBMESH, 2),
        (ElementType::SPRITE_CHAIN, 1),
        (ElementType::SUBMESH, 1),
    ]);
}

#[test]
fn test_clear_empties_queue() {
    let mut queue = RenderQueue::new();
    queue.insert(handle(ElementType::DEBUG_DRAW, 0), 0);
    queue.sort();
    queue.clear();
    assert!(queue.is_empty());
    assert!(queue.handles().is_empty());
    assert_eq!(queue.batches().count(), 0);
}
