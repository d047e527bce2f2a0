use super::*;
use glam::Mat4;
use crate::camera::AABB;
use crate::graphics_device::{Buffer, IndexType, Pipeline, TextureFormat, TextureSamplerInfo, Viewport};
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice, MockPipeline, MockTexture};
use crate::material::MaterialInstance;
use crate::render_element::{ElementHandle, ElementType, IndexBufferBinding};
use crate::render_resources::RenderResources;
use super::super::RenderStates;

struct Fixture {
    device: Arc<MockGraphicsDevice>,
    renderer: SubmeshRenderer,
    data: Box<dyn ElementRendererData>,
    camera: Camera,
}

fn fixture() -> Fixture {
    let device = MockGraphicsDevice::new();
    let sampler_cache = Arc::new(Mutex::new(TextureSamplerCache::new(device.clone())));
    let renderer = SubmeshRenderer::new(sampler_cache);
    let data = renderer.instantiate_data();
    let camera = Camera::new(
        Mat4::IDENTITY,
        Mat4::IDENTITY,
        Viewport::from_rect(Rect2D::from_size(800, 600)),
    );
    Fixture { device, renderer, data, camera }
}

fn textured_material(name: &str) -> Arc<MaterialInstance> {
    let material = MaterialInstance::new(name);
    material.set_texture(
        0,
        MockTexture::shared(4, 4, TextureFormat::R8G8B8A8_SRGB, name),
        TextureSamplerInfo::default(),
    );
    Arc::new(material)
}

fn submesh(
    pipeline: &Arc<dyn Pipeline>,
    material: &Arc<MaterialInstance>,
    vertex_buffer: &Arc<dyn Buffer>,
    index_count: Option<u32>,
) -> SubmeshElement {
    SubmeshElement {
        render_layer: 0,
        pipeline: pipeline.clone(),
        material: material.clone(),
        world_matrix: Mat4::IDENTITY,
        vertex_buffer: vertex_buffer.clone(),
        vertex_count: 3,
        index_buffer: index_count.map(|index_count| IndexBufferBinding {
            buffer: Arc::new(MockBuffer::new(256)),
            index_type: IndexType::U32,
            index_count,
            first_index: 0,
        }),
        world_aabb: AABB::infinite(),
        scissor: None,
    }
}

fn queued<'a>(elements: &'a [SubmeshElement], states: &'a RenderStates) -> Vec<QueuedElement<'a>> {
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| QueuedElement {
            handle: ElementHandle { element_type: ElementType::SUBMESH, index: index as u32 },
            element,
            states,
        })
        .collect()
}

fn count(commands: &[String], command: &str) -> usize {
    commands.iter().filter(|c| c.as_str() == command).count()
}

// ============================================================================
// Prepare
// ============================================================================

#[test]
fn test_material_group_cached_until_binding_version_changes() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![submesh(&pipeline, &material, &vertex_buffer, None)];
    let states = RenderStates::default();

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &queued(&elements, &states)).unwrap();
    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &queued(&elements, &states)).unwrap();
    assert_eq!(f.device.created_binding_groups.load(std::sync::atomic::Ordering::SeqCst), 1);
    let pending = resources.transient().pending_release_count();

    material.set_texture(
        1,
        MockTexture::shared(4, 4, TextureFormat::R8G8B8A8_SRGB, "normal"),
        TextureSamplerInfo::default(),
    );
    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &queued(&elements, &states)).unwrap();
    assert_eq!(f.device.created_binding_groups.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(resources.transient().pending_release_count(), pending + 1);
}

#[test]
fn test_material_without_resources_binds_nothing() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = Arc::new(MaterialInstance::new("plain"));
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![submesh(&pipeline, &material, &vertex_buffer, None)];
    let states = RenderStates::default();
    let elements = queued(&elements, &states);

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &elements).unwrap();
    f.renderer.render(&f.camera, f.data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();

    assert_eq!(f.device.created_binding_groups.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(count(&f.device.commands(), "bind_binding_group:1"), 0);
    assert_eq!(count(&f.device.commands(), "draw:3"), 1);
}

// ============================================================================
// Render
// ============================================================================

#[test]
fn test_render_rebinds_only_on_change() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let opaque = MockPipeline::shared("opaque");
    let alpha = MockPipeline::shared("alpha");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![
        submesh(&opaque, &material, &vertex_buffer, None),
        submesh(&opaque, &material, &vertex_buffer, None),
        submesh(&alpha, &material, &vertex_buffer, None),
    ];
    let states = RenderStates::default();
    let elements = queued(&elements, &states);

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &elements).unwrap();
    f.device.clear_commands();
    f.renderer.render(&f.camera, f.data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();

    let commands = f.device.commands();
    assert_eq!(count(&commands, "bind_pipeline:opaque"), 1);
    assert_eq!(count(&commands, "bind_pipeline:alpha"), 1);
    // One group per (material, pipeline), re-bound after the pipeline switch
    assert_eq!(count(&commands, "bind_binding_group:1"), 2);
    assert_eq!(count(&commands, "bind_vertex_buffer"), 1);
    assert_eq!(count(&commands, "set_scissor"), 1);
    assert_eq!(count(&commands, "push_constants:64:64"), 2);
    assert_eq!(count(&commands, "push_constants:0:64"), 3);
    assert_eq!(count(&commands, "draw:3"), 3);
}

#[test]
fn test_render_indexed_and_non_indexed() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![
        submesh(&pipeline, &material, &vertex_buffer, Some(36)),
        submesh(&pipeline, &material, &vertex_buffer, None),
    ];
    let states = RenderStates::default();
    let elements = queued(&elements, &states);

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &elements).unwrap();
    f.device.clear_commands();
    f.renderer.render(&f.camera, f.data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();

    let commands = f.device.commands();
    assert_eq!(count(&commands, "bind_index_buffer"), 1);
    assert_eq!(count(&commands, "draw_indexed:36"), 1);
    assert_eq!(count(&commands, "draw:3"), 1);
}

#[test]
fn test_light_group_bound_at_light_set() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![
        submesh(&pipeline, &material, &vertex_buffer, None),
        submesh(&pipeline, &material, &vertex_buffer, None),
    ];
    let states = RenderStates { light_buffer: Some(Arc::new(MockBuffer::new(208))) };
    let elements = queued(&elements, &states);

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &elements).unwrap();
    f.device.clear_commands();
    f.renderer.render(&f.camera, f.data.as_mut(), resources.command_list().unwrap(), &elements).unwrap();

    assert_eq!(count(&f.device.commands(), "bind_binding_group:2"), 1);
    let data = f.data.as_any().downcast_ref::<SubmeshRendererData>().unwrap();
    assert_eq!(data.light_group_count(), 1);

    f.renderer.reset(f.data.as_mut(), &mut resources).unwrap();
    let data = f.data.as_any().downcast_ref::<SubmeshRendererData>().unwrap();
    assert_eq!(data.light_group_count(), 0);
    assert_eq!(data.material_group_count(), 1);
}

#[test]
fn test_render_without_prepare_fails() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![submesh(&pipeline, &material, &vertex_buffer, None)];
    let states = RenderStates::default();

    let result = f.renderer.render(
        &f.camera, f.data.as_mut(), resources.command_list().unwrap(), &queued(&elements, &states),
    );
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_evict_material_releases_groups() {
    let mut f = fixture();
    let mut resources = RenderResources::new(f.device.clone(), 0, 800, 600).unwrap();
    let pipeline = MockPipeline::shared("forward");
    let material = textured_material("brick");
    let vertex_buffer: Arc<dyn Buffer> = Arc::new(MockBuffer::new(64));
    let elements = vec![submesh(&pipeline, &material, &vertex_buffer, None)];
    let states = RenderStates::default();

    f.renderer.prepare(&f.camera, f.data.as_mut(), &mut resources, &queued(&elements, &states)).unwrap();
    let pending = resources.transient().pending_release_count();

    f.renderer.evict_material(f.data.as_mut(), &mut resources, material.id());
    assert_eq!(resources.transient().pending_release_count(), pending + 1);
    let data = f.data.as_any().downcast_ref::<SubmeshRendererData>().unwrap();
    assert_eq!(data.material_group_count(), 0);
}
