use super::*;
use glam::{Mat4, Vec3};
use slotmap::SlotMap;
use crate::camera::{Camera, AABB};
use crate::context::{BuiltinPipelines, GraphicsConfig};
use crate::error::{Error, FrameGraphError};
use crate::frame_graph::{AttachmentSize, FramePassAttachment};
use crate::graphics_device::{Rect2D, TextureFormat, Viewport};
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice, MockPipeline};
use crate::render_resources::RenderResources;
use crate::scene::{ElementData, InstancedRenderable, Light, Model, Submesh};
use super::super::{VisibleInstance, VisibleLight, WorldInstanceKey};
use std::sync::atomic::Ordering;

struct Fixture {
    device: Arc<MockGraphicsDevice>,
    pass: ForwardPipelinePass,
    resources: RenderResources,
    camera: Camera,
    material: Arc<MaterialInstance>,
}

fn fixture(config: GraphicsConfig) -> Fixture {
    let device = MockGraphicsDevice::new_auto_complete();
    let builtin = BuiltinPipelines {
        blit: MockPipeline::shared("blit"),
        debug_lines: MockPipeline::shared("debug_lines"),
    };
    let context = GraphicsContext::new(device.clone(), config, builtin).unwrap();
    let pass = ForwardPipelinePass::new(context, "forward").unwrap();
    let resources = RenderResources::new(device.clone(), 0, 800, 600).unwrap();
    let camera = Camera::new(Mat4::IDENTITY, Mat4::IDENTITY, Viewport::from_rect(Rect2D::from_size(800, 600)));

    let material = Arc::new(MaterialInstance::new("lit"));
    material.set_pass_pipeline(1, Some(MockPipeline::shared("forward")));

    Fixture { device, pass, resources, camera, material }
}

fn instance(key: WorldInstanceKey, material: &Arc<MaterialInstance>, position: Vec3) -> VisibleInstance {
    let aabb = AABB::from_center_half_extent(Vec3::ZERO, Vec3::splat(0.5));
    let renderable: Arc<dyn InstancedRenderable> = Arc::new(Model::new(
        vec![Submesh {
            vertex_buffer: Arc::new(MockBuffer::new(96)),
            vertex_count: 3,
            index_buffer: None,
            material: material.clone(),
        }],
        aabb,
    ));
    let world_matrix = Mat4::from_translation(position);
    VisibleInstance {
        key,
        renderable,
        element_data: ElementData {
            world_matrix,
            world_aabb: aabb.transformed(&world_matrix),
            scissor: None,
        },
    }
}

fn point_light(key: LightKey, position: Vec3, version: u64) -> VisibleLight {
    VisibleLight {
        key,
        light: Light::Point { position, radius: 5.0, color: Vec3::ONE, intensity: 1.0 },
        version,
    }
}

fn prepare(fixture: &mut Fixture, visible: &[VisibleInstance], lights: &[VisibleLight], hash: u64) {
    let mut frame = FrameData {
        resources: &mut fixture.resources,
        camera: &fixture.camera,
        visible,
        visibility_hash: hash,
        lights,
        debug_lines: &[],
    };
    fixture.pass.prepare(&mut frame).unwrap();
}

// ============================================================================
// Light selection
// ============================================================================

#[test]
fn test_instances_with_same_lights_share_one_buffer() {
    let mut fixture = fixture(GraphicsConfig::default());
    let mut instance_keys = SlotMap::<WorldInstanceKey, ()>::with_key();
    let mut light_keys = SlotMap::<LightKey, ()>::with_key();

    let visible = vec![
        instance(instance_keys.insert(()), &fixture.material, Vec3::new(-1.0, 0.0, 0.0)),
        instance(instance_keys.insert(()), &fixture.material, Vec3::new(1.0, 0.0, 0.0)),
    ];
    let lights = vec![point_light(light_keys.insert(()), Vec3::ZERO, 1)];

    prepare(&mut fixture, &visible, &lights, 7);

    assert_eq!(fixture.pass.element_count().unwrap(), 2);
    assert_eq!(fixture.pass.light_buffer_count(), 1);
    assert_eq!(fixture.device.created_buffers.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unlit_instance_gets_no_light_buffer() {
    let mut fixture = fixture(GraphicsConfig::default());
    let mut instance_keys = SlotMap::<WorldInstanceKey, ()>::with_key();
    let mut light_keys = SlotMap::<LightKey, ()>::with_key();

    let visible = vec![instance(instance_keys.insert(()), &fixture.material, Vec3::new(100.0, 0.0, 0.0))];
    let lights = vec![point_light(light_keys.insert(()), Vec3::ZERO, 1)];

    prepare(&mut fixture, &visible, &lights, 7);

    assert_eq!(fixture.pass.element_count().unwrap(), 1);
    assert_eq!(fixture.pass.light_buffer_count(), 0);
}

// ============================================================================
// Rebuild policy
// ============================================================================

#[test]
fn test_unchanged_hash_keeps_elements() {
    let mut fixture = fixture(GraphicsConfig::default());
    let mut instance_keys = SlotMap::<WorldInstanceKey, ()>::with_key();
    let mut light_keys = SlotMap::<LightKey, ()>::with_key();
    let visible = vec![instance(instance_keys.insert(()), &fixture.material, Vec3::ZERO)];
    let light_key = light_keys.insert(());

    prepare(&mut fixture, &visible, &[point_light(light_key, Vec3::ZERO, 1)], 7);
    prepare(&mut fixture, &visible, &[point_light(light_key, Vec3::ZERO, 1)], 7);
    assert_eq!(fixture.device.created_buffers.load(Ordering::SeqCst), 1);

    // A moved light changes the light hash
    let pending = fixture.resources.transient().pending_release_count();
    prepare(&mut fixture, &visible, &[point_light(light_key, Vec3::X, 2)], 7);
    assert_eq!(fixture.device.created_buffers.load(Ordering::SeqCst), 2);
    assert!(fixture.resources.transient().pending_release_count() > pending);
}

#[test]
fn test_invalidate_and_pipeline_change_force_rebuild() {
    let mut fixture = fixture(GraphicsConfig::default());
    let mut instance_keys = SlotMap::<WorldInstanceKey, ()>::with_key();
    let mut light_keys = SlotMap::<LightKey, ()>::with_key();
    let visible = vec![instance(instance_keys.insert(()), &fixture.material, Vec3::ZERO)];
    let lights = vec![point_light(light_keys.insert(()), Vec3::ZERO, 1)];
    fixture.pass.register_material_instance(&fixture.material.clone());

    prepare(&mut fixture, &visible, &lights, 7);
    fixture.pass.invalidate_elements();
    prepare(&mut fixture, &visible, &lights, 7);
    assert_eq!(fixture.device.created_buffers.load(Ordering::SeqCst), 2);

    fixture.material.set_pass_pipeline(1, Some(MockPipeline::shared("forward_v2")));
    prepare(&mut fixture, &visible, &lights, 7);
    assert_eq!(fixture.device.created_buffers.load(Ordering::SeqCst), 3);
}

#[test]
fn test_material_use_count() {
    let mut fixture = fixture(GraphicsConfig::default());
    let material = fixture.material.clone();

    fixture.pass.register_material_instance(&material);
    fixture.pass.register_material_instance(&material);
    assert_eq!(fixture.pass.material_use_count(material.id()).unwrap(), 2);

    fixture.pass.unregister_material_instance(&material);
    fixture.pass.unregister_material_instance(&material);
    assert_eq!(fixture.pass.material_use_count(material.id()).unwrap(), 0);

    // Extra unregistration is ignored
    fixture.pass.unregister_material_instance(&material);
    assert_eq!(fixture.pass.material_use_count(material.id()).unwrap(), 0);
}

// ============================================================================
// Frame graph registration
// ============================================================================

fn viewer_graph(depth_prepass: bool) -> (FrameGraph, PassInputOutputs) {
    let mut graph = FrameGraph::new();
    let color = graph.add_attachment(FramePassAttachment::transient(
        "color", TextureFormat::R8G8B8A8_UNORM, AttachmentSize::FULL_FRAME,
    ));
    let depth = graph.add_attachment(FramePassAttachment::transient(
        "depth", TextureFormat::D24_UNORM_S8_UINT, AttachmentSize::FULL_FRAME,
    ));
    graph.set_backbuffer_output(color);
    let io = PassInputOutputs { color, depth, overlay: None, clear_color: [0.0; 4], depth_prepass };
    (graph, io)
}

#[test]
fn test_forward_pass_writes_depth_without_prepass() {
    let mut fixture = fixture(GraphicsConfig::default());
    let (mut graph, io) = viewer_graph(false);
    fixture.pass.register_to_frame_graph(&mut graph, &io).unwrap();

    let compiled = graph.compile().unwrap();
    assert_eq!(compiled.pass_names(), vec!["forward"]);
}

#[test]
fn test_forward_pass_reads_prepass_depth() {
    let mut fixture = fixture(GraphicsConfig::default());
    let (mut graph, io) = viewer_graph(true);
    fixture.pass.register_to_frame_graph(&mut graph, &io).unwrap();

    // Nothing produced the depth the forward pass reads
    match graph.compile() {
        Err(Error::FrameGraph(FrameGraphError::MissingProducer { attachment, .. })) => {
            assert_eq!(attachment, "depth");
        }
        other => panic!("expected MissingProducer, got {:?}", other.map(|_| ())),
    }
}
