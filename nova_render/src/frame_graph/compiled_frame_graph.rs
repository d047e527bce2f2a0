/// CompiledFrameGraph - execution order, aliasing plan and physical resources.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, ClearValue, Framebuffer, FramebufferDesc, LoadOp, Rect2D, RenderPass,
    RenderPassDesc, StoreOp, Texture, TextureDesc, TextureFormat, TextureInfo, TextureLayout,
    TextureUsage, Viewport, GraphicsDevice,
};
use crate::render_resources::RenderResources;
use crate::{engine_debug, engine_error, engine_trace};
use super::frame_graph::check_external;
use super::{
    AttachmentId, AttachmentSize, FramePassAttachment, FramePassExecution, PassAction,
    PassAttachments,
};

const LOG_SOURCE: &str = "nova::FrameGraph";

/// Closed interval of compiled pass positions during which an attachment is live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub first: usize,
    pub last: usize,
}

impl LiveRange {
    /// Ranges sharing at least one pass position overlap
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// What backs an attachment once the graph is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentBacking {
    /// Shares the physical texture of `bucket`
    Transient { bucket: usize },
    /// Texture supplied through `bind_external_texture`
    External,
    /// Transient attachment no kept pass produces
    Unused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentOps {
    pub load: LoadOp,
    pub store: StoreOp,
}

/// Layout change emitted before a pass records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub attachment: AttachmentId,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
}

pub(crate) struct Bucket {
    pub(crate) format: TextureFormat,
    pub(crate) size: AttachmentSize,
    pub(crate) usage: TextureUsage,
    pub(crate) attachments: Vec<AttachmentId>,
}

pub(crate) struct CompiledPass {
    pub(crate) name: String,
    pub(crate) color_outputs: Vec<AttachmentId>,
    pub(crate) color_ops: Vec<AttachmentOps>,
    pub(crate) clear_colors: Vec<[f32; 4]>,
    pub(crate) depth_stencil: Option<AttachmentId>,
    pub(crate) depth_ops: Option<AttachmentOps>,
    pub(crate) depth_layout: TextureLayout,
    pub(crate) depth_clear: (f32, u32),
    pub(crate) declared: Vec<AttachmentId>,
    pub(crate) transitions: Vec<LayoutTransition>,
    pub(crate) action: Option<Box<dyn PassAction>>,
    pub(crate) predicate: Option<Box<dyn Fn() -> FramePassExecution + Send>>,
}

impl CompiledPass {
    fn render_pass_desc(&self, attachments: &[FramePassAttachment]) -> RenderPassDesc {
        let color_attachments = self
            .color_outputs
            .iter()
            .zip(&self.color_ops)
            .map(|(id, ops)| AttachmentDesc {
                format: attachments[id.0].format,
                load_op: ops.load,
                store_op: ops.store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: TextureLayout::ColorAttachment,
                final_layout: TextureLayout::ColorAttachment,
            })
            .collect();

        let depth_stencil_attachment = self.depth_stencil.zip(self.depth_ops).map(|(id, ops)| {
            let format = attachments[id.0].format;
            let (stencil_load_op, stencil_store_op) = if format.has_stencil() {
                (ops.load, ops.store)
            } else {
                (LoadOp::DontCare, StoreOp::DontCare)
            };
            AttachmentDesc {
                format,
                load_op: ops.load,
                store_op: ops.store,
                stencil_load_op,
                stencil_store_op,
                initial_layout: self.depth_layout,
                final_layout: self.depth_layout,
            }
        });

        RenderPassDesc { color_attachments, depth_stencil_attachment }
    }

    fn clear_values(&self) -> Vec<ClearValue> {
        let mut values: Vec<ClearValue> = self.clear_colors.iter().map(|c| ClearValue::Color(*c)).collect();
        if self.depth_stencil.is_some() {
            let (depth, stencil) = self.depth_clear;
            values.push(ClearValue::DepthStencil { depth, stencil });
        }
        values
    }

    fn render_targets(&self) -> impl Iterator<Item = AttachmentId> + '_ {
        self.color_outputs.iter().copied().chain(self.depth_stencil)
    }
}

/// GPU objects created by `resize`
struct PhysicalResources {
    width: u32,
    height: u32,
    bucket_textures: Vec<Arc<dyn Texture>>,
    render_passes: Vec<Arc<dyn RenderPass>>,
    /// `None` for passes rendering into an external texture (built per frame)
    framebuffers: Vec<Option<Arc<dyn Framebuffer>>>,
}

/// Everything a pass needs to resolve an attachment to a texture
struct ResourceTable {
    attachments: Vec<FramePassAttachment>,
    external_textures: Vec<Option<Arc<dyn Texture>>>,
    live_ranges: Vec<Option<LiveRange>>,
    backing: Vec<AttachmentBacking>,
    buckets: Vec<Bucket>,
    backbuffer: Option<AttachmentId>,
    transient_memory_budget: Option<u64>,
    physical: Option<PhysicalResources>,
}

impl ResourceTable {
    fn texture(&self, attachment: AttachmentId) -> Result<Arc<dyn Texture>> {
        let name = &self.attachments[attachment.0].name;
        match self.backing[attachment.0] {
            AttachmentBacking::Transient { bucket } => self
                .physical
                .as_ref()
                .map(|physical| physical.bucket_textures[bucket].clone())
                .ok_or_else(|| Error::InvalidResource(format!(
                    "transient attachment '{}' used before the frame graph was resized", name
                ))),
            AttachmentBacking::External => self.external_textures[attachment.0].clone().ok_or_else(|| {
                Error::InvalidResource(format!("external attachment '{}' has no bound texture", name))
            }),
            AttachmentBacking::Unused => Err(Error::InvalidResource(format!(
                "attachment '{}' is not produced by any executed pass", name
            ))),
        }
    }

    fn touches_external(&self, pass: &CompiledPass) -> bool {
        pass.render_targets().any(|id| self.backing[id.0] == AttachmentBacking::External)
    }

    fn create_framebuffer(
        &self,
        device: &dyn GraphicsDevice,
        pass: &CompiledPass,
        render_pass: &Arc<dyn RenderPass>,
        frame_size: (u32, u32),
    ) -> Result<Arc<dyn Framebuffer>> {
        let color_attachments = pass
            .color_outputs
            .iter()
            .map(|&id| self.texture(id))
            .collect::<Result<Vec<_>>>()?;
        let depth_stencil_attachment = pass.depth_stencil.map(|id| self.texture(id)).transpose()?;

        let (width, height) = color_attachments
            .first()
            .or(depth_stencil_attachment.as_ref())
            .map(|texture| (texture.info().width, texture.info().height))
            .unwrap_or(frame_size);

        device.create_framebuffer(&FramebufferDesc {
            render_pass: render_pass.clone(),
            color_attachments,
            depth_stencil_attachment,
            width,
            height,
        })
    }

    fn bucket_info(&self, bucket: &Bucket, width: u32, height: u32) -> TextureInfo {
        let (width, height) = bucket.size.resolve(width, height);
        TextureInfo { width, height, format: bucket.format, usage: bucket.usage }
    }
}

/// Result of `FrameGraph::compile`
///
/// Holds the execution order and the aliasing plan. Physical textures are
/// created by `resize` and re-created whenever the frame size changes.
pub struct CompiledFrameGraph {
    passes: Vec<CompiledPass>,
    culled: Vec<String>,
    final_transitions: Vec<LayoutTransition>,
    table: ResourceTable,
}

impl CompiledFrameGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        passes: Vec<CompiledPass>,
        culled: Vec<String>,
        attachments: Vec<FramePassAttachment>,
        external_textures: Vec<Option<Arc<dyn Texture>>>,
        live_ranges: Vec<Option<LiveRange>>,
        backing: Vec<AttachmentBacking>,
        buckets: Vec<Bucket>,
        backbuffer: Option<AttachmentId>,
        final_transitions: Vec<LayoutTransition>,
        transient_memory_budget: Option<u64>,
    ) -> Self {
        Self {
            passes,
            culled,
            final_transitions,
            table: ResourceTable {
                attachments,
                external_textures,
                live_ranges,
                backing,
                buckets,
                backbuffer,
                transient_memory_budget,
                physical: None,
            },
        }
    }

    // ===== QUERIES =====

    /// Pass names in execution order
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name.as_str()).collect()
    }

    /// Position of `name` in the execution order
    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|pass| pass.name == name)
    }

    /// Passes removed because nothing they produce is ever used
    pub fn culled_passes(&self) -> &[String] {
        &self.culled
    }

    pub fn color_ops(&self, pass_index: usize) -> &[AttachmentOps] {
        &self.passes[pass_index].color_ops
    }

    pub fn depth_stencil_ops(&self, pass_index: usize) -> Option<AttachmentOps> {
        self.passes[pass_index].depth_ops
    }

    pub fn transitions(&self, pass_index: usize) -> &[LayoutTransition] {
        &self.passes[pass_index].transitions
    }

    pub fn attachment(&self, attachment: AttachmentId) -> Option<&FramePassAttachment> {
        self.table.attachments.get(attachment.0)
    }

    pub fn live_range(&self, attachment: AttachmentId) -> Option<LiveRange> {
        self.table.live_ranges.get(attachment.0).copied().flatten()
    }

    pub fn backing(&self, attachment: AttachmentId) -> AttachmentBacking {
        self.table.backing.get(attachment.0).copied().unwrap_or(AttachmentBacking::Unused)
    }

    pub fn bucket_count(&self) -> usize {
        self.table.buckets.len()
    }

    /// Attachments aliased onto `bucket`, in allocation order
    pub fn bucket_attachments(&self, bucket: usize) -> &[AttachmentId] {
        self.table.buckets.get(bucket).map_or(&[], |b| b.attachments.as_slice())
    }

    pub fn backbuffer(&self) -> Option<AttachmentId> {
        self.table.backbuffer
    }

    /// Texture currently backing `attachment` (after `resize` for transients)
    pub fn texture(&self, attachment: AttachmentId) -> Result<Arc<dyn Texture>> {
        if attachment.0 >= self.table.attachments.len() {
            return Err(Error::InvalidResource(format!("unknown attachment #{}", attachment.0)));
        }
        self.table.texture(attachment)
    }

    /// Bytes of transient memory needed for a `width` x `height` frame
    pub fn transient_memory_required(&self, width: u32, height: u32) -> u64 {
        self.table
            .buckets
            .iter()
            .map(|bucket| self.table.bucket_info(bucket, width, height).byte_size())
            .sum()
    }

    // ===== RESOURCES =====

    /// Re-bind an external attachment (e.g. to this frame's swapchain image)
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` if `attachment` is unknown or transient.
    pub fn bind_external_texture(&mut self, attachment: AttachmentId, texture: Arc<dyn Texture>) -> Result<()> {
        check_external(&self.table.attachments, attachment)?;
        self.table.external_textures[attachment.0] = Some(texture);
        Ok(())
    }

    /// Create the physical textures, render passes and framebuffers for a
    /// `width` x `height` frame.
    ///
    /// Returns `true` when GPU objects were (re)created; replaced objects are
    /// queued on `resources` for deferred release.
    ///
    /// # Errors
    ///
    /// Returns `TransientBudgetExceeded` when the buckets need more memory
    /// than the configured budget.
    pub fn resize(&mut self, resources: &mut RenderResources, width: u32, height: u32) -> Result<bool> {
        if let Some(physical) = &self.table.physical {
            if physical.width == width && physical.height == height {
                return Ok(false);
            }
        }

        let required = self.transient_memory_required(width, height);
        if let Some(budget) = self.table.transient_memory_budget {
            if required > budget {
                engine_error!(LOG_SOURCE,
                    "transient attachments need {} bytes, budget is {} bytes", required, budget);
                return Err(Error::TransientBudgetExceeded { required, budget });
            }
        }

        let device = resources.device().clone();

        let bucket_textures = self
            .table
            .buckets
            .iter()
            .enumerate()
            .map(|(index, bucket)| {
                let info = self.table.bucket_info(bucket, width, height);
                device.create_texture(&TextureDesc {
                    width: info.width,
                    height: info.height,
                    format: info.format,
                    usage: info.usage,
                    name: format!("transient bucket #{}", index),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let render_passes = match self.table.physical.as_ref() {
            Some(previous) => previous.render_passes.clone(),
            None => self
                .passes
                .iter()
                .map(|pass| device.create_render_pass(&pass.render_pass_desc(&self.table.attachments)))
                .collect::<Result<Vec<_>>>()?,
        };

        let previous = self.table.physical.replace(PhysicalResources {
            width,
            height,
            bucket_textures,
            render_passes,
            framebuffers: Vec::new(),
        });

        if let Some(previous) = previous {
            resources.push_for_release(previous);
        }

        let mut framebuffers = Vec::with_capacity(self.passes.len());
        if let Some(physical) = &self.table.physical {
            for (pass, render_pass) in self.passes.iter().zip(&physical.render_passes) {
                if self.table.touches_external(pass) {
                    framebuffers.push(None);
                } else {
                    framebuffers.push(Some(self.table.create_framebuffer(
                        device.as_ref(), pass, render_pass, (width, height),
                    )?));
                }
            }
        }
        if let Some(physical) = self.table.physical.as_mut() {
            physical.framebuffers = framebuffers;
        }

        engine_debug!(LOG_SOURCE, "allocated {} transient textures ({} bytes) for {}x{}",
            self.table.buckets.len(), required, width, height);
        Ok(true)
    }

    /// Size the physical resources were created for
    pub fn size(&self) -> Option<(u32, u32)> {
        self.table.physical.as_ref().map(|physical| (physical.width, physical.height))
    }

    // ===== EXECUTION =====

    /// Record every pass in compiled order
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` if `resize` was never called or an external
    /// attachment has no bound texture; callback errors are propagated.
    pub fn execute(&mut self, resources: &mut RenderResources) -> Result<()> {
        let Self { passes, final_transitions, table, .. } = self;
        let physical = table.physical.as_ref().ok_or_else(|| {
            Error::InvalidResource("frame graph executed before resize".to_string())
        })?;
        let frame_size = (physical.width, physical.height);
        let device = resources.device().clone();

        for (index, pass) in passes.iter_mut().enumerate() {
            {
                let command_list = resources.command_list()?;
                for transition in &pass.transitions {
                    let texture = table.texture(transition.attachment)?;
                    command_list.texture_barrier(&texture, transition.old_layout, transition.new_layout)?;
                }
            }

            if let Some(predicate) = &pass.predicate {
                if predicate() == FramePassExecution::Skip {
                    engine_trace!(LOG_SOURCE, "skipped pass '{}'", pass.name);
                    continue;
                }
            }

            let render_pass = physical.render_passes[index].clone();
            let framebuffer = match physical.framebuffers.get(index).and_then(Option::as_ref) {
                Some(framebuffer) => framebuffer.clone(),
                None => {
                    let framebuffer = table.create_framebuffer(device.as_ref(), pass, &render_pass, frame_size)?;
                    resources.push_for_release(framebuffer.clone());
                    framebuffer
                }
            };

            let textures = pass
                .declared
                .iter()
                .map(|&id| Ok((id, table.texture(id)?)))
                .collect::<Result<Vec<_>>>()?;

            {
                let command_list = resources.command_list()?;
                command_list.begin_debug_region(&pass.name)?;
                command_list.begin_render_pass(&render_pass, &framebuffer, &pass.clear_values())?;
                let area = Rect2D::from_size(framebuffer.width(), framebuffer.height());
                command_list.set_viewport(Viewport::from_rect(area))?;
                command_list.set_scissor(area)?;
            }

            let attachments = PassAttachments::new(&pass.name, textures, frame_size.0, frame_size.1);
            let executed = match pass.action.as_mut() {
                Some(action) => action.execute(resources, &attachments),
                None => Ok(()),
            };

            // Close the render pass even when the callback failed
            let command_list = resources.command_list()?;
            command_list.end_render_pass()?;
            command_list.end_debug_region()?;
            executed?;
        }

        let command_list = resources.command_list()?;
        for transition in final_transitions.iter() {
            let texture = table.texture(transition.attachment)?;
            command_list.texture_barrier(&texture, transition.old_layout, transition.new_layout)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "compiled_frame_graph_tests.rs"]
mod tests;
