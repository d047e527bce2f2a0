/// Mock graphics device for unit tests (no GPU required)
///
/// Every command recorded by a `MockCommandList` lands in the device's
/// shared command log, so tests can assert on the exact sequence of
/// backend calls a frame produced.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, SubmissionIndex,
    Texture, TextureDesc, TextureInfo, TextureFormat, TextureUsage, TextureLayout,
    Buffer, BufferDesc, Sampler, TextureSamplerInfo,
    RenderPass, RenderPassDesc, Framebuffer, FramebufferDesc,
    Pipeline, BindingGroup, BindingResource, CommandList, Swapchain,
    ClearValue, IndexType, Rect2D, ShaderStage, Viewport,
};

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub name: String,
}

impl MockTexture {
    pub fn new(width: u32, height: u32, format: TextureFormat, name: &str) -> Self {
        Self {
            info: TextureInfo {
                width,
                height,
                format,
                usage: TextureUsage::SAMPLED | TextureUsage::COLOR_ATTACHMENT,
            },
            name: name.to_string(),
        }
    }

    pub fn shared(width: u32, height: u32, format: TextureFormat, name: &str) -> Arc<dyn Texture> {
        Arc::new(Self::new(width, height, format, name))
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64) -> Self {
        Self { size, data: Mutex::new(vec![0; size as usize]) }
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        if end > self.size as usize {
            return Err(Error::InvalidResource(format!(
                "buffer update out of bounds: {} > {}", end, self.size
            )));
        }
        let mut storage = self.data.lock().unwrap();
        storage[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

// ============================================================================
// Mock Sampler / Pipeline / BindingGroup / RenderPass / Framebuffer
// ============================================================================

#[derive(Debug)]
pub struct MockSampler {
    pub info: TextureSamplerInfo,
}

impl Sampler for MockSampler {
    fn info(&self) -> &TextureSamplerInfo {
        &self.info
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub name: String,
}

impl MockPipeline {
    pub fn shared(name: &str) -> Arc<dyn Pipeline> {
        Arc::new(Self { name: name.to_string() })
    }
}

impl Pipeline for MockPipeline {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct MockBindingGroup {
    pub set_index: u32,
    pub resource_count: usize,
}

impl BindingGroup for MockBindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }
}

#[derive(Debug)]
pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {}

#[derive(Debug)]
pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    log: Arc<Mutex<Vec<String>>>,
    pub recording: bool,
}

impl MockCommandList {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { log, recording: false }
    }

    fn record(&self, command: String) {
        self.log.lock().unwrap().push(command);
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.recording = true;
        self.record("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.recording = false;
        self.record("end".to_string());
        Ok(())
    }

    fn begin_debug_region(&mut self, name: &str) -> Result<()> {
        self.record(format!("begin_debug_region:{}", name));
        Ok(())
    }

    fn end_debug_region(&mut self) -> Result<()> {
        self.record("end_debug_region".to_string());
        Ok(())
    }

    fn texture_barrier(
        &mut self,
        _texture: &Arc<dyn Texture>,
        old_layout: TextureLayout,
        new_layout: TextureLayout,
    ) -> Result<()> {
        self.record(format!("texture_barrier:{:?}->{:?}", old_layout, new_layout));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        _framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.record(format!("begin_render_pass:{}", clear_values.len()));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record("end_render_pass".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, _viewport: Viewport) -> Result<()> {
        self.record("set_viewport".to_string());
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        self.record("set_scissor".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.record(format!("bind_pipeline:{}", pipeline.name()));
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        _binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()> {
        self.record(format!("bind_binding_group:{}", set_index));
        Ok(())
    }

    fn push_constants(&mut self, _stages: &[ShaderStage], offset: u32, data: &[u8]) -> Result<()> {
        self.record(format!("push_constants:{}:{}", offset, data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.record("bind_vertex_buffer".to_string());
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        self.record("bind_index_buffer".to_string());
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.record(format!("draw:{}", vertex_count));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.record(format!("draw_indexed:{}", index_count));
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub images: Vec<Arc<dyn Texture>>,
    pub next_image: u32,
    pub presented: Arc<Mutex<Vec<u32>>>,
    pub width: u32,
    pub height: u32,
}

impl MockSwapchain {
    pub fn new(image_count: u32, width: u32, height: u32) -> Self {
        let images = (0..image_count)
            .map(|i| MockTexture::shared(width, height, TextureFormat::B8G8R8A8_UNORM, &format!("swapchain{}", i)))
            .collect();
        Self {
            images,
            next_image: 0,
            presented: Arc::new(Mutex::new(Vec::new())),
            width,
            height,
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        Ok(index)
    }

    fn image(&self, image_index: u32) -> Option<Arc<dyn Texture>> {
        self.images.get(image_index as usize).cloned()
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        self.presented.lock().unwrap().push(image_index);
        Ok(())
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_UNORM
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Mock device that tracks created objects and simulates fence completion
pub struct MockGraphicsDevice {
    pub command_log: Arc<Mutex<Vec<String>>>,
    pub created_textures: Mutex<Vec<TextureDesc>>,
    pub created_samplers: AtomicUsize,
    pub created_buffers: AtomicUsize,
    pub created_binding_groups: AtomicUsize,
    pub created_render_passes: AtomicUsize,
    pub created_framebuffers: AtomicUsize,
    pub waits: AtomicUsize,
    last_submission: AtomicU64,
    completed_submission: AtomicU64,
    auto_complete: AtomicBool,
}

impl MockGraphicsDevice {
    /// Device whose submissions only complete on `wait_for_submission` or `complete_all`
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            command_log: Arc::new(Mutex::new(Vec::new())),
            created_textures: Mutex::new(Vec::new()),
            created_samplers: AtomicUsize::new(0),
            created_buffers: AtomicUsize::new(0),
            created_binding_groups: AtomicUsize::new(0),
            created_render_passes: AtomicUsize::new(0),
            created_framebuffers: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
            last_submission: AtomicU64::new(0),
            completed_submission: AtomicU64::new(0),
            auto_complete: AtomicBool::new(false),
        })
    }

    /// Device whose submissions complete immediately
    pub fn new_auto_complete() -> Arc<Self> {
        let device = Self::new();
        device.auto_complete.store(true, Ordering::SeqCst);
        device
    }

    /// Mark every issued submission as complete
    pub fn complete_all(&self) {
        let last = self.last_submission.load(Ordering::SeqCst);
        self.completed_submission.fetch_max(last, Ordering::SeqCst);
    }

    pub fn last_submission(&self) -> SubmissionIndex {
        SubmissionIndex(self.last_submission.load(Ordering::SeqCst))
    }

    pub fn commands(&self) -> Vec<String> {
        self.command_log.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.command_log.lock().unwrap().clear();
    }

    pub fn texture_count(&self) -> usize {
        self.created_textures.lock().unwrap().len()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        self.created_textures.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockTexture {
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                usage: desc.usage,
            },
            name: desc.name.clone(),
        }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.created_buffers.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBuffer::new(desc.size)))
    }

    fn create_sampler(&self, info: &TextureSamplerInfo) -> Result<Arc<dyn Sampler>> {
        self.created_samplers.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSampler { info: *info }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        self.created_render_passes.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockRenderPass { desc: desc.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        self.created_framebuffers.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockFramebuffer { width: desc.width, height: desc.height }))
    }

    fn create_binding_group(
        &self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Arc<dyn BindingGroup>> {
        self.created_binding_groups.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBindingGroup { set_index, resource_count: resources.len() }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(self.command_log.clone())))
    }

    fn submit(&self, _command_list: &dyn CommandList) -> Result<SubmissionIndex> {
        let index = self.last_submission.fetch_add(1, Ordering::SeqCst) + 1;
        self.command_log.lock().unwrap().push(format!("submit:{}", index));
        if self.auto_complete.load(Ordering::SeqCst) {
            self.completed_submission.fetch_max(index, Ordering::SeqCst);
        }
        Ok(SubmissionIndex(index))
    }

    fn is_submission_complete(&self, submission: SubmissionIndex) -> bool {
        submission.0 <= self.completed_submission.load(Ordering::SeqCst)
    }

    fn wait_for_submission(&self, submission: SubmissionIndex) -> Result<()> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        self.completed_submission.fetch_max(submission.0, Ordering::SeqCst);
        Ok(())
    }
}
