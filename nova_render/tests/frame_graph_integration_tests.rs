//! Integration tests for frame graph compilation
//!
//! Only the public API is used. Compilation needs no device.
//!
//! Run with: cargo test --test frame_graph_integration_tests

use std::sync::Arc;
use nova_render::frame_graph::{
    AttachmentBacking, AttachmentId, AttachmentSize, CompiledFrameGraph, FrameGraph,
    FramePassAttachment, LiveRange,
};
use nova_render::graphics_device::{Texture, TextureFormat, TextureInfo, TextureUsage};
use nova_render::nova::{Error, FrameGraphError, Result};

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Caller-owned texture standing in for a swapchain image
struct PresentTexture {
    info: TextureInfo,
}

impl Texture for PresentTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

fn present_texture() -> Arc<dyn Texture> {
    Arc::new(PresentTexture {
        info: TextureInfo {
            width: 1280,
            height: 720,
            format: TextureFormat::B8G8R8A8_SRGB,
            usage: TextureUsage::COLOR_ATTACHMENT,
        },
    })
}

fn color(graph: &mut FrameGraph, name: &str) -> AttachmentId {
    graph.add_attachment(FramePassAttachment::transient(
        name, TextureFormat::R8G8B8A8_UNORM, AttachmentSize::FULL_FRAME,
    ))
}

fn backbuffer(graph: &mut FrameGraph) -> AttachmentId {
    let id = graph.add_attachment(FramePassAttachment::external(
        "Backbuffer", TextureFormat::B8G8R8A8_SRGB, AttachmentSize::FULL_FRAME,
    ));
    graph.set_backbuffer_output(id);
    id
}

fn expect_graph_error(result: Result<CompiledFrameGraph>) -> FrameGraphError {
    match result {
        Err(Error::FrameGraph(err)) => err,
        Err(other) => panic!("expected a frame graph error, got {:?}", other),
        Ok(_) => panic!("expected compilation to fail"),
    }
}

/// Post-processing chain: scene, bloom (two blur passes), tonemap, UI, present
struct PostChain {
    graph: FrameGraph,
    attachments: Vec<AttachmentId>,
    producers: Vec<(&'static str, Vec<AttachmentId>)>,
    consumers: Vec<(&'static str, Vec<AttachmentId>)>,
}

fn post_chain() -> PostChain {
    let mut graph = FrameGraph::new();
    let depth = graph.add_attachment(FramePassAttachment::transient(
        "Depth", TextureFormat::D32_FLOAT, AttachmentSize::FULL_FRAME,
    ));
    let hdr = graph.add_attachment(FramePassAttachment::transient(
        "HDR", TextureFormat::R16G16B16A16_SFLOAT, AttachmentSize::FULL_FRAME,
    ));
    let half = AttachmentSize::FrameRelative { width_ratio: 0.5, height_ratio: 0.5 };
    let blur_h = graph.add_attachment(FramePassAttachment::transient(
        "BlurH", TextureFormat::R16G16B16A16_SFLOAT, half,
    ));
    let blur_v = graph.add_attachment(FramePassAttachment::transient(
        "BlurV", TextureFormat::R16G16B16A16_SFLOAT, half,
    ));
    let ldr = color(&mut graph, "LDR");
    let ui = color(&mut graph, "UI");
    let bb = backbuffer(&mut graph);

    // Declared out of order on purpose
    graph.add_pass("Present").add_input(ui).add_input(ldr).add_output(bb);
    graph.add_pass("Tonemap").add_input(hdr).add_input(blur_v).add_output(ldr);
    graph.add_pass("UI").add_output(ui).set_clear_color(0, [0.0; 4]);
    graph.add_pass("BlurV").add_input(blur_h).add_output(blur_v);
    graph.add_pass("BlurH").add_input(hdr).add_output(blur_h);
    graph.add_pass("Scene")
        .set_depth_stencil_output(depth)
        .set_depth_stencil_clear(1.0, 0)
        .add_output(hdr);

    PostChain {
        graph,
        attachments: vec![depth, hdr, blur_h, blur_v, ldr, ui, bb],
        producers: vec![
            ("Scene", vec![depth, hdr]),
            ("BlurH", vec![blur_h]),
            ("BlurV", vec![blur_v]),
            ("Tonemap", vec![ldr]),
            ("UI", vec![ui]),
            ("Present", vec![bb]),
        ],
        consumers: vec![
            ("BlurH", vec![hdr]),
            ("BlurV", vec![blur_h]),
            ("Tonemap", vec![hdr, blur_v]),
            ("Present", vec![ui, ldr]),
        ],
    }
}

// ============================================================================
// STRUCTURAL ERRORS
// ============================================================================

#[test]
fn test_cycle_is_rejected_and_named() {
    let mut graph = FrameGraph::new();
    let a = color(&mut graph, "A");
    let b = color(&mut graph, "B");
    let bb = backbuffer(&mut graph);
    graph.add_pass("Reflect").add_input(b).add_output(a);
    graph.add_pass("Refract").add_input(a).add_output(b);
    graph.add_pass("Present").add_input(a).add_output(bb);

    match expect_graph_error(graph.compile()) {
        FrameGraphError::CyclicDependency { passes } => {
            assert!(passes.iter().any(|p| p == "Reflect" || p == "Refract"));
            assert!(!passes.iter().any(|p| p == "Present"));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[test]
fn test_two_writers_are_ambiguous() {
    let mut graph = FrameGraph::new();
    let a = color(&mut graph, "A");
    graph.add_pass("Opaque").add_output(a);
    graph.add_pass("Transparent").add_output(a);

    match expect_graph_error(graph.compile()) {
        FrameGraphError::AmbiguousProducer { attachment, passes } => {
            assert_eq!(attachment, "A");
            assert_eq!(passes, vec!["Opaque".to_string(), "Transparent".to_string()]);
        }
        other => panic!("expected an ambiguous producer, got {:?}", other),
    }
}

#[test]
fn test_transient_read_without_writer() {
    let mut graph = FrameGraph::new();
    let a = color(&mut graph, "A");
    let b = color(&mut graph, "B");
    graph.add_pass("Blur").add_input(a).add_output(b);

    assert_eq!(
        expect_graph_error(graph.compile()),
        FrameGraphError::MissingProducer { attachment: "A".to_string(), pass: "Blur".to_string() }
    );
}

#[test]
fn test_compile_error_converts_to_display() {
    let mut graph = FrameGraph::new();
    let a = color(&mut graph, "A");
    graph.add_pass("One").add_output(a);
    graph.add_pass("Two").add_output(a);

    let err = graph.compile().err().unwrap();
    assert!(err.to_string().contains("ambiguous producer"));
}

// ============================================================================
// ORDERING AND ALIASING
// ============================================================================

#[test]
fn test_depth_lighting_present() {
    let mut graph = FrameGraph::new();
    let d = graph.add_attachment(FramePassAttachment::transient(
        "D", TextureFormat::D24_UNORM_S8_UINT, AttachmentSize::FULL_FRAME,
    ));
    let c = color(&mut graph, "C");
    let bb = backbuffer(&mut graph);
    graph.add_pass("Depth").set_depth_stencil_output(d);
    graph.add_pass("Lighting").set_depth_stencil_input(d).add_output(c);
    graph.add_pass("Present").add_input(c).add_output(bb);

    let compiled = graph.compile().unwrap();
    assert_eq!(compiled.pass_names(), vec!["Depth", "Lighting", "Present"]);
    assert_eq!(compiled.live_range(d), Some(LiveRange { first: 0, last: 1 }));
    assert_eq!(compiled.live_range(c), Some(LiveRange { first: 1, last: 2 }));
    assert_ne!(compiled.backing(d), compiled.backing(c));
}

#[test]
fn test_disjoint_ranges_share_memory() {
    let mut graph = FrameGraph::new();
    let a = color(&mut graph, "A");
    let b = color(&mut graph, "B");
    let c = color(&mut graph, "C");
    let bb = backbuffer(&mut graph);
    graph.add_pass("Write A").add_output(a);
    graph.add_pass("A to B").add_input(a).add_output(b);
    graph.add_pass("B to C").add_input(b).add_output(c);
    graph.add_pass("Present").add_input(c).add_output(bb);

    let compiled = graph.compile().unwrap();
    // A spans [0,1], C spans [2,3]
    assert_eq!(compiled.backing(a), compiled.backing(c));
    assert_ne!(compiled.backing(a), compiled.backing(b));
    assert_eq!(compiled.bucket_count(), 2);
}

#[test]
fn test_producers_run_before_consumers() {
    let chain = post_chain();
    let compiled = chain.graph.compile().unwrap();
    assert_eq!(compiled.pass_names().len(), 6);

    for (consumer, reads) in &chain.consumers {
        let consumer_position = compiled.pass_index(consumer).unwrap();
        for attachment in reads {
            let (producer, _) = chain
                .producers
                .iter()
                .find(|(_, writes)| writes.contains(attachment))
                .unwrap();
            assert!(
                compiled.pass_index(producer).unwrap() < consumer_position,
                "{} must run before {}", producer, consumer
            );
        }
    }
}

#[test]
fn test_shared_buckets_never_overlap() {
    let chain = post_chain();
    let compiled = chain.graph.compile().unwrap();

    for bucket in 0..compiled.bucket_count() {
        let members = compiled.bucket_attachments(bucket);
        for (i, first) in members.iter().enumerate() {
            for second in &members[i + 1..] {
                let a = compiled.live_range(*first).unwrap();
                let b = compiled.live_range(*second).unwrap();
                assert!(!a.overlaps(&b), "{:?} and {:?} alias while both live", first, second);
            }
        }
    }
}

#[test]
fn test_every_transient_is_backed() {
    let chain = post_chain();
    let compiled = chain.graph.compile().unwrap();
    let bb = compiled.backbuffer().unwrap();

    for attachment in &chain.attachments {
        if *attachment == bb {
            assert_eq!(compiled.backing(bb), AttachmentBacking::External);
        } else {
            assert!(matches!(compiled.backing(*attachment), AttachmentBacking::Transient { .. }));
        }
    }
    assert!(compiled.transient_memory_required(1280, 720) > 0);
}

// ============================================================================
// EXTERNAL ATTACHMENTS
// ============================================================================

#[test]
fn test_external_attachment_resolves_to_supplied_texture() {
    let mut graph = FrameGraph::new();
    let scene = color(&mut graph, "Scene");
    let bb = backbuffer(&mut graph);
    graph.add_pass("Scene").add_output(scene);
    graph.add_pass("Present").add_input(scene).add_output(bb);

    let first = present_texture();
    graph.bind_external_texture(bb, first.clone()).unwrap();
    let mut compiled = graph.compile().unwrap();
    assert!(Arc::ptr_eq(&compiled.texture(bb).unwrap(), &first));

    // Next swapchain image
    let second = present_texture();
    compiled.bind_external_texture(bb, second.clone()).unwrap();
    assert!(Arc::ptr_eq(&compiled.texture(bb).unwrap(), &second));

    for bucket in 0..compiled.bucket_count() {
        assert!(!compiled.bucket_attachments(bucket).contains(&bb));
    }
}

#[test]
fn test_unused_branch_is_culled() {
    let mut chain = post_chain();
    let probe = color(&mut chain.graph, "Probe");
    chain.graph.add_pass("Probe").add_output(probe);

    let compiled = chain.graph.compile().unwrap();
    assert_eq!(compiled.culled_passes(), &["Probe".to_string()]);
    assert_eq!(compiled.backing(probe), AttachmentBacking::Unused);
}
