/// FrameGraph - declaration and compilation.
///
/// Compilation runs in a fixed order and stops at the first structural
/// error:
///
/// 1. attachment ids are validated
/// 2. each attachment has at most one writer
/// 3. every non-external read has a writer
/// 4. passes are sorted topologically (Kahn, declaration order breaks ties)
/// 5. passes that reach neither the backbuffer nor an external attachment are culled
/// 6. transient live ranges are computed over the compiled order
/// 7. transients are packed into buckets (one physical texture per bucket)
///
/// Live ranges are closed intervals of pass indices: two attachments used by
/// the same pass never share a bucket, while one ending at pass `i` and one
/// starting at pass `i + 1` may.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::{Error, FrameGraphError, Result};
use crate::graphics_device::{LoadOp, StoreOp, Texture, TextureFormat, TextureLayout, TextureUsage};
use crate::{engine_debug, engine_error, engine_trace};
use super::attachment::SizeKey;
use super::compiled_frame_graph::{Bucket, CompiledPass};
use super::{
    AttachmentBacking, AttachmentId, AttachmentOps, CompiledFrameGraph, FramePass,
    FramePassAttachment, LayoutTransition, LiveRange, StorageClass,
};

const LOG_SOURCE: &str = "nova::FrameGraph";

/// Declarative pass/attachment graph
pub struct FrameGraph {
    attachments: Vec<FramePassAttachment>,
    passes: Vec<FramePass>,
    external_textures: Vec<Option<Arc<dyn Texture>>>,
    backbuffer: Option<AttachmentId>,
    transient_memory_budget: Option<u64>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self {
            attachments: Vec::new(),
            passes: Vec::new(),
            external_textures: Vec::new(),
            backbuffer: None,
            transient_memory_budget: None,
        }
    }

    pub fn add_attachment(&mut self, attachment: FramePassAttachment) -> AttachmentId {
        self.attachments.push(attachment);
        self.external_textures.push(None);
        AttachmentId(self.attachments.len() - 1)
    }

    /// Declare a pass; configure it through the returned builder
    pub fn add_pass(&mut self, name: impl Into<String>) -> &mut FramePass {
        self.passes.push(FramePass::new(name.into()));
        let index = self.passes.len() - 1;
        &mut self.passes[index]
    }

    /// Supply the texture behind an external attachment
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` if `attachment` is unknown or transient.
    pub fn bind_external_texture(&mut self, attachment: AttachmentId, texture: Arc<dyn Texture>) -> Result<()> {
        check_external(&self.attachments, attachment)?;
        self.external_textures[attachment.0] = Some(texture);
        Ok(())
    }

    /// Mark the attachment presented at the end of the frame
    pub fn set_backbuffer_output(&mut self, attachment: AttachmentId) {
        self.backbuffer = Some(attachment);
    }

    /// Transient memory ceiling enforced by `CompiledFrameGraph::resize`
    pub fn set_transient_memory_budget(&mut self, budget: Option<u64>) {
        self.transient_memory_budget = budget;
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Compile into an execution order and a transient resource plan.
    ///
    /// Structural errors are logged and returned before any GPU object
    /// is created.
    pub fn compile(self) -> Result<CompiledFrameGraph> {
        match self.plan() {
            Ok(plan) => Ok(self.into_compiled(plan)),
            Err(err) => {
                engine_error!(LOG_SOURCE, "frame graph compilation failed: {}", err);
                Err(Error::FrameGraph(err))
            }
        }
    }

    // ===== COMPILATION STEPS =====

    fn plan(&self) -> std::result::Result<Plan, FrameGraphError> {
        self.validate_attachments()?;
        let writers = self.collect_writers()?;
        self.check_producers(&writers)?;

        let producers: Vec<Option<usize>> = writers.iter().map(|w| w.first().copied()).collect();
        let predecessors = self.predecessors(&producers);
        let order = self.topological_order(&predecessors)?;
        let (order, culled) = self.cull(order, &producers, &predecessors)?;

        let live_ranges = self.live_ranges(&order, &producers);
        let (backing, buckets) = self.assign_buckets(&order, &live_ranges);

        Ok(Plan { order, culled, live_ranges, backing, buckets })
    }

    fn validate_attachments(&self) -> std::result::Result<(), FrameGraphError> {
        for pass in &self.passes {
            if let Some(id) = pass.reads().chain(pass.writes()).find(|id| id.0 >= self.attachments.len()) {
                return Err(FrameGraphError::InvalidAttachment {
                    pass: pass.name.clone(),
                    attachment: id.0,
                });
            }
        }
        if let Some(backbuffer) = self.backbuffer {
            if backbuffer.0 >= self.attachments.len() {
                return Err(FrameGraphError::InvalidAttachment {
                    pass: "backbuffer".to_string(),
                    attachment: backbuffer.0,
                });
            }
        }
        Ok(())
    }

    /// Writer passes per attachment; more than one is an error
    fn collect_writers(&self) -> std::result::Result<Vec<Vec<usize>>, FrameGraphError> {
        let mut writers: Vec<Vec<usize>> = vec![Vec::new(); self.attachments.len()];
        for (pass_index, pass) in self.passes.iter().enumerate() {
            for id in pass.writes() {
                if !writers[id.0].contains(&pass_index) {
                    writers[id.0].push(pass_index);
                }
            }
        }

        if let Some((attachment, passes)) = writers.iter().enumerate().find(|(_, w)| w.len() > 1) {
            return Err(FrameGraphError::AmbiguousProducer {
                attachment: self.attachments[attachment].name.clone(),
                passes: passes.iter().map(|&p| self.passes[p].name.clone()).collect(),
            });
        }
        Ok(writers)
    }

    fn check_producers(&self, writers: &[Vec<usize>]) -> std::result::Result<(), FrameGraphError> {
        for pass in &self.passes {
            for id in pass.reads() {
                let attachment = &self.attachments[id.0];
                if writers[id.0].is_empty() && attachment.storage != StorageClass::External {
                    return Err(FrameGraphError::MissingProducer {
                        attachment: attachment.name.clone(),
                        pass: pass.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Producer passes of everything each pass reads (sorted, deduplicated)
    fn predecessors(&self, producers: &[Option<usize>]) -> Vec<Vec<usize>> {
        self.passes
            .iter()
            .map(|pass| {
                let mut preds: Vec<usize> = pass.reads().filter_map(|id| producers[id.0]).collect();
                preds.sort_unstable();
                preds.dedup();
                preds
            })
            .collect()
    }

    fn topological_order(&self, predecessors: &[Vec<usize>]) -> std::result::Result<Vec<usize>, FrameGraphError> {
        let pass_count = self.passes.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
        let mut in_degree: Vec<usize> = vec![0; pass_count];
        for (pass, preds) in predecessors.iter().enumerate() {
            in_degree[pass] = preds.len();
            for &pred in preds {
                successors[pred].push(pass);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..pass_count)
            .filter(|&pass| in_degree[pass] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(pass_count);
        while let Some(Reverse(pass)) = ready.pop() {
            order.push(pass);
            for &next in &successors[pass] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < pass_count {
            let mut placed = vec![false; pass_count];
            for &pass in &order {
                placed[pass] = true;
            }
            let cycle = find_cycle(predecessors, &placed);
            return Err(FrameGraphError::CyclicDependency {
                passes: cycle.iter().map(|&p| self.passes[p].name.clone()).collect(),
            });
        }
        Ok(order)
    }

    /// Drop passes whose results never reach the backbuffer or an external attachment
    fn cull(
        &self,
        order: Vec<usize>,
        producers: &[Option<usize>],
        predecessors: &[Vec<usize>],
    ) -> std::result::Result<(Vec<usize>, Vec<String>), FrameGraphError> {
        let backbuffer = match self.backbuffer {
            Some(backbuffer) => backbuffer,
            None => return Ok((order, Vec::new())),
        };

        if producers[backbuffer.0].is_none() {
            return Err(FrameGraphError::BackbufferNotWritten {
                attachment: self.attachments[backbuffer.0].name.clone(),
            });
        }

        let mut needed = vec![false; self.passes.len()];
        let mut stack: Vec<usize> = self
            .passes
            .iter()
            .enumerate()
            .filter(|(_, pass)| {
                pass.writes().any(|id| {
                    id == backbuffer || self.attachments[id.0].storage == StorageClass::External
                })
            })
            .map(|(index, _)| index)
            .collect();

        while let Some(pass) = stack.pop() {
            if needed[pass] {
                continue;
            }
            needed[pass] = true;
            stack.extend(predecessors[pass].iter().copied().filter(|&p| !needed[p]));
        }

        let mut culled = Vec::new();
        let kept = order
            .into_iter()
            .filter(|&pass| {
                if !needed[pass] {
                    engine_trace!(LOG_SOURCE, "culled pass '{}'", self.passes[pass].name);
                    culled.push(self.passes[pass].name.clone());
                }
                needed[pass]
            })
            .collect();
        Ok((kept, culled))
    }

    /// Closed `[first, last]` intervals over positions in `order`
    fn live_ranges(&self, order: &[usize], producers: &[Option<usize>]) -> Vec<Option<LiveRange>> {
        let mut position: Vec<Option<usize>> = vec![None; self.passes.len()];
        for (index, &pass) in order.iter().enumerate() {
            position[pass] = Some(index);
        }

        let mut ranges: Vec<Option<LiveRange>> = vec![None; self.attachments.len()];
        for (attachment, producer) in producers.iter().enumerate() {
            if let Some(first) = producer.and_then(|p| position[p]) {
                ranges[attachment] = Some(LiveRange { first, last: first });
            }
        }

        for (index, &pass) in order.iter().enumerate() {
            for id in self.passes[pass].reads() {
                let range = ranges[id.0].get_or_insert(LiveRange { first: index, last: index });
                range.last = range.last.max(index);
            }
        }

        if let (Some(backbuffer), Some(last)) = (self.backbuffer, order.len().checked_sub(1)) {
            if let Some(range) = ranges[backbuffer.0].as_mut() {
                range.last = last;
            }
        }
        ranges
    }

    /// Greedy bucket assignment in compiled order
    fn assign_buckets(
        &self,
        order: &[usize],
        live_ranges: &[Option<LiveRange>],
    ) -> (Vec<AttachmentBacking>, Vec<Bucket>) {
        let usage = self.attachment_usage(order);

        let mut backing: Vec<AttachmentBacking> = self
            .attachments
            .iter()
            .map(|attachment| match attachment.storage {
                StorageClass::External => AttachmentBacking::External,
                StorageClass::Transient => AttachmentBacking::Unused,
            })
            .collect();

        let mut starts_at: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        let mut ends_at: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        for (attachment, range) in live_ranges.iter().enumerate() {
            if self.attachments[attachment].storage != StorageClass::Transient {
                continue;
            }
            if let Some(range) = range {
                starts_at[range.first].push(attachment);
                ends_at[range.last].push(attachment);
            }
        }

        let mut buckets: Vec<Bucket> = Vec::new();
        let mut free_lists: FxHashMap<(TextureFormat, SizeKey), Vec<usize>> = FxHashMap::default();

        for position in 0..order.len() {
            if position > 0 {
                for &attachment in &ends_at[position - 1] {
                    if let AttachmentBacking::Transient { bucket } = backing[attachment] {
                        free_lists.entry(self.bucket_key(attachment)).or_default().push(bucket);
                    }
                }
            }

            for &attachment in &starts_at[position] {
                let key = self.bucket_key(attachment);
                let bucket = match free_lists.get_mut(&key).and_then(|free| free.pop()) {
                    Some(bucket) => {
                        engine_trace!(LOG_SOURCE, "attachment '{}' reuses bucket #{}",
                            self.attachments[attachment].name, bucket);
                        bucket
                    }
                    None => {
                        let declaration = &self.attachments[attachment];
                        buckets.push(Bucket {
                            format: declaration.format,
                            size: declaration.size,
                            usage: TextureUsage::empty(),
                            attachments: Vec::new(),
                        });
                        buckets.len() - 1
                    }
                };
                buckets[bucket].usage |= usage[attachment];
                buckets[bucket].attachments.push(AttachmentId(attachment));
                backing[attachment] = AttachmentBacking::Transient { bucket };
            }
        }

        (backing, buckets)
    }

    fn bucket_key(&self, attachment: usize) -> (TextureFormat, SizeKey) {
        let declaration = &self.attachments[attachment];
        (declaration.format, declaration.size.key())
    }

    /// Union of the ways kept passes touch each attachment
    fn attachment_usage(&self, order: &[usize]) -> Vec<TextureUsage> {
        let mut usage = vec![TextureUsage::empty(); self.attachments.len()];
        for &pass in order {
            let pass = &self.passes[pass];
            for id in &pass.inputs {
                usage[id.0] |= TextureUsage::SAMPLED;
            }
            for id in &pass.outputs {
                usage[id.0] |= TextureUsage::COLOR_ATTACHMENT;
            }
            for id in pass.depth_stencil_input.iter().chain(pass.depth_stencil_output.iter()) {
                usage[id.0] |= TextureUsage::DEPTH_STENCIL_ATTACHMENT;
            }
        }
        if let Some(backbuffer) = self.backbuffer {
            usage[backbuffer.0] |= TextureUsage::SAMPLED;
        }
        usage
    }

    // ===== COMPILED OUTPUT =====

    fn into_compiled(self, plan: Plan) -> CompiledFrameGraph {
        let Plan { order, culled, live_ranges, backing, buckets } = plan;

        // Last position at which each attachment is read
        let mut last_read: Vec<Option<usize>> = vec![None; self.attachments.len()];
        for (position, &pass) in order.iter().enumerate() {
            for id in self.passes[pass].reads() {
                last_read[id.0] = Some(position);
            }
        }

        let keeps_content = |id: AttachmentId, position: usize| -> bool {
            self.attachments[id.0].storage == StorageClass::External
                || self.backbuffer == Some(id)
                || last_read[id.0].map_or(false, |read| read > position)
        };
        let store_op = |keep: bool| if keep { StoreOp::Store } else { StoreOp::DontCare };

        let mut layouts = vec![TextureLayout::Undefined; self.attachments.len()];
        let mut compiled_passes = Vec::with_capacity(order.len());
        let mut slots: Vec<Option<FramePass>> = self.passes.into_iter().map(Some).collect();

        for (position, &pass_index) in order.iter().enumerate() {
            let Some(mut pass) = slots[pass_index].take() else { continue };

            let mut transitions = Vec::new();
            let mut transition = |id: AttachmentId, layout: TextureLayout| {
                if layouts[id.0] != layout {
                    transitions.push(LayoutTransition { attachment: id, old_layout: layouts[id.0], new_layout: layout });
                    layouts[id.0] = layout;
                }
            };

            for &id in &pass.inputs {
                transition(id, TextureLayout::ShaderReadOnly);
            }
            for &id in &pass.outputs {
                transition(id, TextureLayout::ColorAttachment);
            }

            let (depth_stencil, depth_ops, depth_layout) = match (pass.depth_stencil_output, pass.depth_stencil_input) {
                (Some(output), _) => {
                    transition(output, TextureLayout::DepthStencilAttachment);
                    let load = if pass.depth_stencil_clear.is_some() { LoadOp::Clear } else { LoadOp::DontCare };
                    let ops = AttachmentOps { load, store: store_op(keeps_content(output, position)) };
                    (Some(output), Some(ops), TextureLayout::DepthStencilAttachment)
                }
                (None, Some(input)) => {
                    transition(input, TextureLayout::DepthStencilReadOnly);
                    let ops = AttachmentOps { load: LoadOp::Load, store: store_op(keeps_content(input, position)) };
                    (Some(input), Some(ops), TextureLayout::DepthStencilReadOnly)
                }
                (None, None) => (None, None, TextureLayout::Undefined),
            };

            let color_ops = pass
                .outputs
                .iter()
                .enumerate()
                .map(|(output_index, &id)| AttachmentOps {
                    load: if pass.clear_color(output_index).is_some() { LoadOp::Clear } else { LoadOp::DontCare },
                    store: store_op(keeps_content(id, position)),
                })
                .collect();
            let clear_colors = (0..pass.outputs.len())
                .map(|output_index| pass.clear_color(output_index).unwrap_or([0.0; 4]))
                .collect();

            let mut declared: Vec<AttachmentId> = pass.reads().chain(pass.writes()).collect();
            declared.sort_unstable();
            declared.dedup();

            compiled_passes.push(CompiledPass {
                name: std::mem::take(&mut pass.name),
                color_outputs: std::mem::take(&mut pass.outputs),
                color_ops,
                clear_colors,
                depth_stencil,
                depth_ops,
                depth_layout,
                depth_clear: pass.depth_stencil_clear.unwrap_or((1.0, 0)),
                declared,
                transitions,
                action: pass.action.take(),
                predicate: pass.predicate.take(),
            });
        }

        let final_transitions = match self.backbuffer {
            Some(backbuffer) if layouts[backbuffer.0] != TextureLayout::Present => vec![LayoutTransition {
                attachment: backbuffer,
                old_layout: layouts[backbuffer.0],
                new_layout: TextureLayout::Present,
            }],
            _ => Vec::new(),
        };

        engine_debug!(
            LOG_SOURCE,
            "compiled {} passes ({} culled), {} attachments in {} transient buckets",
            compiled_passes.len(),
            culled.len(),
            self.attachments.len(),
            buckets.len()
        );

        CompiledFrameGraph::new(
            compiled_passes,
            culled,
            self.attachments,
            self.external_textures,
            live_ranges,
            backing,
            buckets,
            self.backbuffer,
            final_transitions,
            self.transient_memory_budget,
        )
    }
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

struct Plan {
    order: Vec<usize>,
    culled: Vec<String>,
    live_ranges: Vec<Option<LiveRange>>,
    backing: Vec<AttachmentBacking>,
    buckets: Vec<Bucket>,
}

pub(crate) fn check_external(attachments: &[FramePassAttachment], attachment: AttachmentId) -> Result<()> {
    match attachments.get(attachment.0) {
        None => Err(Error::InvalidResource(format!("unknown attachment #{}", attachment.0))),
        Some(declaration) if declaration.storage != StorageClass::External => Err(Error::InvalidResource(
            format!("attachment '{}' is transient and cannot be bound", declaration.name),
        )),
        Some(_) => Ok(()),
    }
}

/// Walk unplaced predecessors from the first unplaced pass until a pass
/// repeats; the repeated stretch is a real cycle. Returned in dependency
/// order, starting from its lowest declaration index.
fn find_cycle(predecessors: &[Vec<usize>], placed: &[bool]) -> Vec<usize> {
    let Some(start) = placed.iter().position(|&p| !p) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut path_position: Vec<Option<usize>> = vec![None; placed.len()];
    let mut pass = start;

    loop {
        if let Some(position) = path_position[pass] {
            let mut cycle = path.split_off(position);
            cycle.reverse();
            if let Some(lowest) = cycle.iter().enumerate().min_by_key(|&(_, &p)| p).map(|(i, _)| i) {
                cycle.rotate_left(lowest);
            }
            return cycle;
        }
        path_position[pass] = Some(path.len());
        path.push(pass);

        match predecessors[pass].iter().copied().find(|&p| !placed[p]) {
            Some(next) => pass = next,
            None => return path,
        }
    }
}

#[cfg(test)]
#[path = "frame_graph_tests.rs"]
mod tests;
