/// Frame graph module - declarative passes and attachments.
///
/// A `FrameGraph` is declared every time the frame layout changes (viewers
/// added or removed), then compiled into a `CompiledFrameGraph` which owns
/// the execution order, the transient aliasing plan and the physical
/// textures backing it.

mod attachment;
mod frame_pass;
mod frame_graph;
mod compiled_frame_graph;

pub use attachment::{AttachmentId, AttachmentSize, StorageClass, FramePassAttachment};
pub use frame_pass::{FramePass, FramePassExecution, PassAction, PassAttachments};
pub use frame_graph::FrameGraph;
pub use compiled_frame_graph::{
    CompiledFrameGraph, AttachmentBacking, AttachmentOps, LayoutTransition, LiveRange,
};
