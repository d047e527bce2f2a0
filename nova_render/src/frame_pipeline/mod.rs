/// Frame pipeline module - viewers, world instances, lights and the per-frame state machine
///
/// The `FramePipeline` culls registered world instances per viewer, lets
/// each viewer's passes rebuild their render elements when visibility
/// changed, declares a frame graph (memoized until viewers change) and
/// executes it into the acquired swapchain image.

mod viewer;
mod frame_pipeline_pass;
mod element_pass_state;
mod depth_pipeline_pass;
mod forward_pipeline_pass;
mod debug_draw_pipeline_pass;
mod composition_pass;
mod frame_pipeline;

pub use viewer::{Viewer, ViewerTarget};
pub use frame_pipeline_pass::{FrameData, FramePipelinePass, PassInputOutputs, VisibleInstance, VisibleLight};
pub use depth_pipeline_pass::DepthPipelinePass;
pub use forward_pipeline_pass::ForwardPipelinePass;
pub use debug_draw_pipeline_pass::DebugDrawPipelinePass;
pub use frame_pipeline::{FramePipeline, FrameStage, LightKey, ViewerKey, WorldInstanceKey};
