/// ElementPassState - render elements of one pass, shared with its graph callback.
///
/// The pipeline pass owns the state during `prepare`; the frame graph
/// action it registers locks the same state while the graph executes.
/// Elements are rebuilt only when the visibility hash changes, a used
/// material changes, or the pass was invalidated.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use rustc_hash::FxHashMap;
use crate::camera::Camera;
use crate::context::GraphicsContext;
use crate::element_renderer::{ElementRendererData, QueuedElement, RenderStates};
use crate::error::{Error, Result};
use crate::frame_graph::{PassAction, PassAttachments};
use crate::graphics_device::CommandList;
use crate::material::{MaterialId, MaterialInstance};
use crate::render_element::{
    ElementHandle, ElementKind, ElementType, RenderElementOwner, RenderElementPools,
    RenderQueue, RenderQueueRegistry,
};
use crate::render_resources::RenderResources;
use super::VisibleInstance;

const LOG_SOURCE: &str = "nova::FramePipeline";

static NO_STATES: RenderStates = RenderStates { light_buffer: None };

/// Lock shared pass state; a poisoned lock is a backend error
pub(crate) fn lock_state<T>(state: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    state
        .lock()
        .map_err(|_| crate::engine_err!(LOG_SOURCE, "pass state lock poisoned"))
}

struct MaterialUse {
    material: Weak<MaterialInstance>,
    count: usize,
    pipeline_version: u64,
    binding_version: u64,
}

/// Allocation side of a rebuild
pub(crate) struct ElementBuilder<'s> {
    material_pass: usize,
    pools: &'s mut RenderElementPools,
    owners: &'s mut Vec<RenderElementOwner>,
    render_states: &'s mut FxHashMap<ElementHandle, RenderStates>,
}

impl ElementBuilder<'_> {
    /// Build the elements of a visible instance; `states` applies to all of them
    pub fn add_instance(&mut self, instance: &VisibleInstance, states: Option<&RenderStates>) -> Result<()> {
        let first = self.owners.len();
        instance.renderable.build_elements(
            self.material_pass,
            &instance.element_data,
            self.pools,
            self.owners,
        )?;
        if let Some(states) = states {
            for owner in &self.owners[first..] {
                self.render_states.insert(owner.handle(), states.clone());
            }
        }
        Ok(())
    }

    pub fn add_element<T: ElementKind>(&mut self, element: T) -> Result<ElementHandle> {
        let (owner, _) = self.pools.allocate(element)?;
        let handle = owner.handle();
        self.owners.push(owner);
        Ok(handle)
    }
}

pub(crate) struct ElementPassState {
    context: Arc<GraphicsContext>,
    material_pass: usize,
    pools: RenderElementPools,
    owners: Vec<RenderElementOwner>,
    queue: RenderQueue,
    registry: RenderQueueRegistry,
    renderer_data: Vec<Option<Box<dyn ElementRendererData>>>,
    render_states: FxHashMap<ElementHandle, RenderStates>,
    camera: Option<Camera>,
    materials: FxHashMap<MaterialId, MaterialUse>,
    pending_evictions: Vec<MaterialId>,
    last_hash: Option<u64>,
    rebuild_elements: bool,
}

fn renderer_data_slot(
    renderer_data: &mut [Option<Box<dyn ElementRendererData>>],
    element_type: ElementType,
) -> Result<&mut dyn ElementRendererData> {
    match renderer_data.get_mut(element_type.0 as usize) {
        Some(Some(data)) => Ok(data.as_mut()),
        _ => Err(Error::InvalidResource(format!(
            "no renderer data for element type {}", element_type.0
        ))),
    }
}

fn resolve<'a>(
    pools: &'a RenderElementPools,
    render_states: &'a FxHashMap<ElementHandle, RenderStates>,
    handles: &[ElementHandle],
) -> Result<Vec<QueuedElement<'a>>> {
    handles
        .iter()
        .map(|&handle| {
            let element = pools.get(handle).ok_or_else(|| {
                Error::InvalidResource(format!("queued element {:?} is not allocated", handle))
            })?;
            Ok(QueuedElement {
                handle,
                element,
                states: render_states.get(&handle).unwrap_or(&NO_STATES),
            })
        })
        .collect()
}

impl ElementPassState {
    pub fn new(context: Arc<GraphicsContext>, material_pass: usize) -> Self {
        let pools = RenderElementPools::new(context.config().max_render_elements);
        let renderer_data = context.element_renderers().instantiate_data();
        Self {
            context,
            material_pass,
            pools,
            owners: Vec::new(),
            queue: RenderQueue::new(),
            registry: RenderQueueRegistry::new(),
            renderer_data,
            render_states: FxHashMap::default(),
            camera: None,
            materials: FxHashMap::default(),
            pending_evictions: Vec::new(),
            last_hash: None,
            rebuild_elements: true,
        }
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn invalidate(&mut self) {
        self.rebuild_elements = true;
    }

    pub fn element_count(&self) -> usize {
        self.queue.len()
    }

    pub fn material_use_count(&self, material: MaterialId) -> usize {
        self.materials.get(&material).map_or(0, |entry| entry.count)
    }

    pub fn register_material(&mut self, material: &Arc<MaterialInstance>) {
        let entry = self.materials.entry(material.id()).or_insert_with(|| MaterialUse {
            material: Arc::downgrade(material),
            count: 0,
            pipeline_version: material.pipeline_version(),
            binding_version: material.binding_version(),
        });
        entry.count += 1;
    }

    pub fn unregister_material(&mut self, material: &MaterialInstance) {
        let id = material.id();
        let Some(entry) = self.materials.get_mut(&id) else {
            return;
        };
        entry.count -= 1;
        if entry.count == 0 {
            self.materials.remove(&id);
            self.pending_evictions.push(id);
        }
    }

    /// Take this frame's camera and drop bindings of materials no longer used
    pub fn begin_frame(&mut self, resources: &mut RenderResources, camera: &Camera) {
        self.camera = Some(camera.clone());

        if self.pending_evictions.is_empty() {
            return;
        }
        let Self { context, renderer_data, pending_evictions, .. } = self;
        let renderers = context.element_renderers();
        for material in pending_evictions.drain(..) {
            for (slot, data) in renderer_data.iter_mut().enumerate() {
                if let (Some(data), Some(renderer)) = (data.as_mut(), renderers.renderer(ElementType(slot as u8))) {
                    renderer.evict_material(data.as_mut(), resources, material);
                }
            }
            crate::engine_trace!(LOG_SOURCE, "evicted bindings of material {:?}", material);
        }
    }

    /// Whether elements must be rebuilt for a frame with visibility `hash`
    pub fn needs_rebuild(&mut self, hash: u64) -> bool {
        let mut changed = self.rebuild_elements || self.last_hash != Some(hash);
        for entry in self.materials.values_mut() {
            let Some(material) = entry.material.upgrade() else {
                continue;
            };
            let pipeline_version = material.pipeline_version();
            let binding_version = material.binding_version();
            if pipeline_version != entry.pipeline_version || binding_version != entry.binding_version {
                entry.pipeline_version = pipeline_version;
                entry.binding_version = binding_version;
                changed = true;
            }
        }
        changed
    }

    /// Replace every element with what `build` allocates, then sort and prepare them.
    ///
    /// Previous owners go through the release queue, so their slots are
    /// reused only once the frames drawing them are complete. A failed
    /// rebuild is retried at the next frame.
    pub fn rebuild<F>(&mut self, resources: &mut RenderResources, hash: u64, build: F) -> Result<()>
    where
        F: FnOnce(&mut ElementBuilder<'_>) -> Result<()>,
    {
        self.rebuild_elements = true;
        self.rebuild_inner(resources, build)?;
        self.last_hash = Some(hash);
        self.rebuild_elements = false;
        Ok(())
    }

    fn rebuild_inner<F>(&mut self, resources: &mut RenderResources, build: F) -> Result<()>
    where
        F: FnOnce(&mut ElementBuilder<'_>) -> Result<()>,
    {
        let Self {
            context, material_pass, pools, owners, queue, registry,
            renderer_data, render_states, camera, ..
        } = self;
        let camera = camera.as_ref().ok_or_else(|| {
            Error::InvalidResource("elements rebuilt before the frame camera was set".to_string())
        })?;

        if !owners.is_empty() {
            resources.push_for_release(std::mem::take(owners));
        }
        render_states.clear();
        queue.clear();
        registry.clear();

        build(&mut ElementBuilder {
            material_pass: *material_pass,
            pools: &mut *pools,
            owners: &mut *owners,
            render_states: &mut *render_states,
        })?;

        for owner in owners.iter() {
            if let Some(element) = pools.get(owner.handle()) {
                element.register(registry);
            }
        }
        let eye = camera.position();
        for owner in owners.iter() {
            let handle = owner.handle();
            if let Some(element) = pools.get(handle) {
                queue.insert(handle, element.sorting_score(registry, eye));
            }
        }
        queue.sort();

        let renderers = context.element_renderers();
        for (slot, data) in renderer_data.iter_mut().enumerate() {
            if let (Some(data), Some(renderer)) = (data.as_mut(), renderers.renderer(ElementType(slot as u8))) {
                renderer.reset(data.as_mut(), resources)?;
            }
        }

        renderers.process_render_queue(queue, |element_type, renderer, handles| {
            let elements = resolve(pools, render_states, handles)?;
            let data = renderer_data_slot(renderer_data, element_type)?;
            renderer.prepare(camera, data, resources, &elements)
        })?;

        for (slot, data) in renderer_data.iter_mut().enumerate() {
            if let (Some(data), Some(renderer)) = (data.as_mut(), renderers.renderer(ElementType(slot as u8))) {
                renderer.prepare_end(data.as_mut(), resources)?;
            }
        }

        crate::engine_trace!(LOG_SOURCE, "rebuilt {} render elements for material pass {}",
            queue.len(), material_pass);
        Ok(())
    }

    /// Record the prepared elements inside the running render pass
    pub fn render(&mut self, command_list: &mut dyn CommandList) -> Result<()> {
        let Self { context, pools, queue, renderer_data, render_states, camera, .. } = self;
        let Some(camera) = camera.as_ref() else {
            return Ok(());
        };
        if queue.is_empty() {
            return Ok(());
        }

        command_list.set_viewport(*camera.viewport())?;
        command_list.set_scissor(camera.effective_scissor())?;

        context.element_renderers().process_render_queue(queue, |element_type, renderer, handles| {
            let elements = resolve(pools, render_states, handles)?;
            let data = renderer_data_slot(renderer_data, element_type)?;
            renderer.render(camera, data, command_list, &elements)
        })
    }
}

/// Frame graph action drawing an `ElementPassState`
pub(crate) struct ElementPassAction {
    state: Arc<Mutex<ElementPassState>>,
}

impl ElementPassAction {
    pub fn new(state: Arc<Mutex<ElementPassState>>) -> Self {
        Self { state }
    }
}

impl PassAction for ElementPassAction {
    fn execute(&mut self, resources: &mut RenderResources, _attachments: &PassAttachments) -> Result<()> {
        let mut state = lock_state(&self.state)?;
        state.render(resources.command_list()?)
    }
}
