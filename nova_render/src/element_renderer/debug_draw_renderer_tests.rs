use super::*;
use glam::Mat4;
use crate::graphics_device::{Rect2D, Viewport};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockPipeline};
use crate::render_element::ElementType;
use super::super::RenderStates;

fn camera() -> Camera {
    Camera::new(Mat4::IDENTITY, Mat4::IDENTITY, Viewport::from_rect(Rect2D::from_size(64, 64)))
}

fn lines(pipeline: &Arc<dyn crate::graphics_device::Pipeline>, line_count: usize) -> DebugDrawElement {
    let vertex = DebugLineVertex { position: [0.0; 3], color: [1.0, 0.0, 0.0, 1.0] };
    DebugDrawElement { pipeline: pipeline.clone(), vertices: vec![vertex; line_count * 2] }
}

fn queued<'a>(elements: &'a [DebugDrawElement], states: &'a RenderStates) -> Vec<QueuedElement<'a>> {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| QueuedElement {
            handle: ElementHandle { element_type: ElementType::DEBUG_DRAW, index: index as u32 },
            element,
            states,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_lines_share_one_vertex_buffer() {
    let device = MockGraphicsDevice::new();
    let mut resources = RenderResources::new(device.clone(), 0, 64, 64).unwrap();
    let renderer = DebugDrawRenderer::new();
    let mut data = renderer.instantiate_data();
    let pipeline = MockPipeline::shared("debug_lines");
    let elements = vec![lines(&pipeline, 2), lines(&pipeline, 3)];
    let states = RenderStates::default();
    let elements = queued(&elements, &states);

    renderer.prepare(&camera(), data.as_mut(), &mut resources, &elements).unwrap();
    device.clear_commands();
    renderer.render(&camera(), data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();

    assert_eq!(device.commands(), vec![
        "bind_pipeline:debug_lines",
        "push_constants:64:64",
        "bind_vertex_buffer",
        "draw:4",
        "draw:6",
    ]);
}

#[test]
fn test_reset_releases_buffers() {
    let device = MockGraphicsDevice::new();
    let mut resources = RenderResources::new(device.clone(), 0, 64, 64).unwrap();
    let renderer = DebugDrawRenderer::new();
    let mut data = renderer.instantiate_data();
    let pipeline = MockPipeline::shared("debug_lines");
    let elements = vec![lines(&pipeline, 1)];
    let states = RenderStates::default();

    renderer.prepare(&camera(), data.as_mut(), &mut resources, &queued(&elements, &states)).unwrap();
    let pending = resources.transient().pending_release_count();
    renderer.reset(data.as_mut(), &mut resources).unwrap();

    assert_eq!(resources.transient().pending_release_count(), pending + 1);
    let data = data.as_any().downcast_ref::<DebugDrawRendererData>().unwrap();
    assert_eq!(data.vertex_buffer_count(), 0);
}

#[test]
fn test_empty_element_draws_nothing() {
    let device = MockGraphicsDevice::new();
    let mut resources = RenderResources::new(device.clone(), 0, 64, 64).unwrap();
    let renderer = DebugDrawRenderer::new();
    let mut data = renderer.instantiate_data();
    let pipeline = MockPipeline::shared("debug_lines");
    let elements = vec![lines(&pipeline, 0)];
    let states = RenderStates::default();
    let elements = queued(&elements, &states);

    renderer.prepare(&camera(), data.as_mut(), &mut resources, &elements).unwrap();
    device.clear_commands();
    renderer.render(&camera(), data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();
    assert!(device.commands().is_empty());
}
