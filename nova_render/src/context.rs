/// GraphicsContext - device-level state shared by every frame pipeline.
///
/// Created once per device and passed to constructors as
/// `Arc<GraphicsContext>`: the device, the configuration, the sampler
/// cache, the element renderers, the material pass names and the
/// built-in pipelines.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::element_renderer::{
    DebugDrawRenderer, ElementRendererRegistry, SpriteChainRenderer, SubmeshRenderer,
};
use crate::graphics_device::{GraphicsDevice, Pipeline, Sampler, TextureFormat, TextureSamplerInfo};
use crate::material::MaterialPassRegistry;
use crate::render_element::{DebugDrawElement, SpriteChainElement, SubmeshElement};
use crate::texture_sampler_cache::TextureSamplerCache;

/// Material pass used by the depth pre-pass
pub const DEPTH_PASS: &str = "DepthPass";
/// Material pass used by the forward pass
pub const FORWARD_PASS: &str = "ForwardPass";

/// Render core configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsConfig {
    /// Capacity of each render element pool
    pub max_render_elements: u32,
    /// Lights bound per draw by the forward pass
    pub max_lights_per_draw: usize,
    /// Frames recorded ahead of the GPU
    pub frames_in_flight: usize,
    /// Render a depth-only pass before the forward pass
    pub depth_prepass: bool,
    /// Upper bound for transient attachment memory, in bytes
    pub transient_memory_budget: Option<u64>,
    /// Format of viewer color attachments
    pub color_format: TextureFormat,
    /// Format of viewer depth attachments
    pub depth_stencil_format: TextureFormat,
    /// Backend validation layers
    pub enable_validation: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            max_render_elements: 65_536,
            max_lights_per_draw: 3,
            frames_in_flight: 3,
            depth_prepass: true,
            transient_memory_budget: None,
            color_format: TextureFormat::R8G8B8A8_UNORM,
            depth_stencil_format: TextureFormat::D24_UNORM_S8_UINT,
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// Pipelines the render core draws with itself (shader creation is up to the backend)
#[derive(Clone)]
pub struct BuiltinPipelines {
    /// Full-screen textured triangle used by the composition pass
    pub blit: Arc<dyn Pipeline>,
    /// Line-list pipeline used by the debug-draw pass
    pub debug_lines: Arc<dyn Pipeline>,
}

pub struct GraphicsContext {
    device: Arc<dyn GraphicsDevice>,
    config: GraphicsConfig,
    sampler_cache: Arc<Mutex<TextureSamplerCache>>,
    element_renderers: ElementRendererRegistry,
    material_passes: MaterialPassRegistry,
    builtin_pipelines: BuiltinPipelines,
}

impl GraphicsContext {
    /// Create the context and register the built-in element renderers
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: GraphicsConfig,
        builtin_pipelines: BuiltinPipelines,
    ) -> Result<Arc<Self>> {
        if config.frames_in_flight == 0 {
            return Err(Error::InitializationFailed("frames_in_flight must be at least 1".to_string()));
        }
        if config.max_render_elements == 0 {
            return Err(Error::InitializationFailed("max_render_elements must be at least 1".to_string()));
        }

        let sampler_cache = Arc::new(Mutex::new(TextureSamplerCache::new(device.clone())));

        let mut element_renderers = ElementRendererRegistry::new();
        element_renderers.register_element_renderer::<SubmeshElement>(
            Box::new(SubmeshRenderer::new(sampler_cache.clone())));
        element_renderers.register_element_renderer::<SpriteChainElement>(
            Box::new(SpriteChainRenderer::new(sampler_cache.clone())));
        element_renderers.register_element_renderer::<DebugDrawElement>(
            Box::new(DebugDrawRenderer::new()));

        let mut material_passes = MaterialPassRegistry::new();
        material_passes.register_pass(DEPTH_PASS);
        material_passes.register_pass(FORWARD_PASS);

        crate::engine_info!("nova::GraphicsContext",
            "context created ({} frames in flight, {} max elements per pool, validation {})",
            config.frames_in_flight, config.max_render_elements,
            if config.enable_validation { "on" } else { "off" });

        Ok(Arc::new(Self {
            device,
            config,
            sampler_cache,
            element_renderers,
            material_passes,
            builtin_pipelines,
        }))
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn sampler_cache(&self) -> &Arc<Mutex<TextureSamplerCache>> {
        &self.sampler_cache
    }

    /// Shared sampler for `info` from the context's cache
    pub fn sampler(&self, info: &TextureSamplerInfo) -> Result<Arc<dyn Sampler>> {
        let mut cache = self.sampler_cache.lock().map_err(|_| {
            crate::engine_err!("nova::GraphicsContext", "texture sampler cache lock poisoned")
        })?;
        cache.get(info)
    }

    pub fn element_renderers(&self) -> &ElementRendererRegistry {
        &self.element_renderers
    }

    pub fn material_passes(&self) -> &MaterialPassRegistry {
        &self.material_passes
    }

    /// Index of a registered material pass
    pub fn material_pass_index(&self, name: &str) -> Result<usize> {
        self.material_passes
            .pass_index(name)
            .ok_or_else(|| Error::InvalidResource(format!("unknown material pass '{}'", name)))
    }

    pub fn builtin_pipelines(&self) -> &BuiltinPipelines {
        &self.builtin_pipelines
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
